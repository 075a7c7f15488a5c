use fa2_deploy_sdk::{
    ChainClient, ContractHandle, DeployError, MetadataView, PendingOperation,
};
use fa2_deploy_tests::{load_artifacts, mint_plan, TestContext};
use serial_test::serial;

#[tokio::test]
#[serial]
async fn report_carries_the_contract_metadata() -> anyhow::Result<()> {
    let ctx = TestContext::new();
    let mut orchestrator = ctx.orchestrator(load_artifacts()?, mint_plan(1)).await?;

    let report = orchestrator.run().await?;

    assert_eq!(report.metadata.uri, "tezos-storage:content");
    assert_eq!(report.metadata.metadata["name"], "FA2 Demo Collection");
    let interfaces = report.metadata.metadata["interfaces"]
        .as_array()
        .expect("interfaces list");
    assert!(interfaces.iter().any(|i| i == "TZIP-012"));
    assert!(interfaces.iter().any(|i| i == "TZIP-016"));

    let json = serde_json::to_value(&report)?;
    assert_eq!(json["metadata"]["uri"], "tezos-storage:content");
    assert_eq!(json["minted"][0]["token_id"], 1);
    Ok(())
}

#[tokio::test]
#[serial]
async fn handle_without_tzip16_cannot_fetch_metadata() -> anyhow::Result<()> {
    let ctx = TestContext::new();
    let client = ctx.chain.client_for(ctx.account.clone());

    let origination = client.originate(&load_artifacts()?).await?;
    origination.operation.confirmation().await?;

    let plain = client.contract_at(&origination.contract_address, &[]).await?;
    assert_eq!(plain.address(), &origination.contract_address);
    let err = plain.fetch_metadata().await.unwrap_err();
    assert!(matches!(err, DeployError::Metadata(_)));
    Ok(())
}

#[tokio::test]
#[serial]
async fn unconfirmed_contract_is_not_reachable() -> anyhow::Result<()> {
    let ctx = TestContext::new();
    let client = ctx.chain.client_for(ctx.account.clone());

    let origination = client.originate(&load_artifacts()?).await?;
    let res = client.contract_at(&origination.contract_address, &[]).await;
    assert!(matches!(res, Err(DeployError::Rpc(_))));

    let first = origination.operation.confirmation().await?;
    let again = origination.operation.confirmation().await?;
    assert_eq!(first, again);
    assert!(client
        .contract_at(&origination.contract_address, &[])
        .await
        .is_ok());
    Ok(())
}
