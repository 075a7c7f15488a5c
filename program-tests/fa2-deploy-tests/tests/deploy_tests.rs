use fa2_deploy_sdk::{pack, sandbox::DEFAULT_FEE, DeployError, MintRequest, Mutez, Stage};
use fa2_deploy_tests::{
    address, artifacts_with_next_token_id, load_artifacts, load_mints, mint_plan, TestContext,
    FUNDING, MINTER, OWNER, STRANGER,
};
use serial_test::serial;

#[tokio::test]
#[serial]
async fn deploy_mints_plan_in_order_from_zero() -> anyhow::Result<()> {
    let ctx = TestContext::new();
    let mut orchestrator = ctx
        .orchestrator(artifacts_with_next_token_id(0)?, load_mints()?)
        .await?;

    let report = orchestrator.run().await?;

    let ids: Vec<u64> = report.minted.iter().map(|m| m.token_id).collect();
    assert_eq!(ids, vec![0, 1]);
    assert_eq!(report.address, address(MINTER));
    assert_eq!(report.balance, FUNDING);
    assert!(report.contract_address.is_contract());
    assert_eq!(orchestrator.stage(), Stage::Done);

    let lines = ctx.reporter.lines();
    assert_eq!(lines.len(), 10);
    assert_eq!(lines[0], format!("Account address: {MINTER}"));
    assert_eq!(lines[1], format!("Account balance: {}", FUNDING));
    assert_eq!(lines[2], "Originating contract…");
    assert_eq!(
        lines[3],
        format!("Contract address: {}", report.contract_address)
    );
    assert_eq!(lines[4], "Awaiting confirmation…");
    assert_eq!(lines[5], "Minting token #0 (id: 0)…");
    assert_eq!(lines[6], "Awaiting confirmation…");
    assert_eq!(lines[7], "Minting token #1 (id: 1)…");
    assert_eq!(lines[8], "Awaiting confirmation…");
    assert_eq!(lines[9], report.metadata.to_string());

    let storage = ctx
        .chain
        .contract_storage(&report.contract_address)
        .expect("contract is live");
    assert_eq!(storage.next_token_id, 2);
    assert_eq!(storage.token_owners.get(&0), Some(&address(OWNER)));
    assert_eq!(
        storage.token_metadata[&0]["key1"],
        pack("baab").to_bytes()
    );
    assert_eq!(
        storage.token_metadata[&1]["key1"],
        pack("abba").to_bytes()
    );
    Ok(())
}

#[tokio::test]
#[serial]
async fn token_ids_follow_the_contract_counter() -> anyhow::Result<()> {
    let ctx = TestContext::new();
    // Shipped storage starts the counter at 1.
    let mut orchestrator = ctx.orchestrator(load_artifacts()?, mint_plan(3)).await?;

    let report = orchestrator.run().await?;

    let ids: Vec<u64> = report.minted.iter().map(|m| m.token_id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    let indexes: Vec<usize> = report.minted.iter().map(|m| m.index).collect();
    assert_eq!(indexes, vec![0, 1, 2]);

    let lines = ctx.reporter.lines();
    assert!(lines.contains(&"Minting token #0 (id: 1)…".to_string()));
    assert!(lines.contains(&"Minting token #2 (id: 3)…".to_string()));
    Ok(())
}

#[tokio::test]
#[serial]
async fn each_confirmation_bakes_one_level() -> anyhow::Result<()> {
    let ctx = TestContext::new();
    let mut orchestrator = ctx.orchestrator(load_artifacts()?, load_mints()?).await?;

    let report = orchestrator.run().await?;

    let levels: Vec<u64> = report.minted.iter().map(|m| m.level).collect();
    assert_eq!(levels, vec![2, 3]);
    assert_eq!(ctx.chain.level(), 3);
    assert_eq!(
        ctx.chain.balance(&ctx.account),
        Mutez(FUNDING.0 - 3 * DEFAULT_FEE.0)
    );
    Ok(())
}

#[tokio::test]
#[serial]
async fn tokens_can_be_minted_to_other_owners() -> anyhow::Result<()> {
    let ctx = TestContext::new();
    let plan = vec![MintRequest::new(address(STRANGER), [("decimals", "0")])];
    let mut orchestrator = ctx
        .orchestrator(artifacts_with_next_token_id(0)?, plan)
        .await?;

    let report = orchestrator.run().await?;

    let storage = ctx
        .chain
        .contract_storage(&report.contract_address)
        .expect("contract is live");
    assert_eq!(storage.token_owners.get(&0), Some(&address(STRANGER)));
    Ok(())
}

#[tokio::test]
#[serial]
async fn empty_plan_originates_and_fetches_metadata() -> anyhow::Result<()> {
    let ctx = TestContext::new();
    let mut orchestrator = ctx.orchestrator(load_artifacts()?, Vec::new()).await?;

    let report = orchestrator.run().await?;

    assert!(report.minted.is_empty());
    assert_eq!(
        orchestrator.history(),
        &[
            Stage::Start,
            Stage::IdentityResolved,
            Stage::BalanceChecked,
            Stage::Originated,
            Stage::OriginConfirmed,
            Stage::MetadataFetched,
            Stage::Done,
        ]
    );
    assert_eq!(ctx.reporter.lines().len(), 6);
    Ok(())
}

#[tokio::test]
#[serial]
async fn a_run_cannot_be_repeated() -> anyhow::Result<()> {
    let ctx = TestContext::new();
    let mut orchestrator = ctx.orchestrator(load_artifacts()?, Vec::new()).await?;

    orchestrator.run().await?;
    let err = orchestrator.run().await.unwrap_err();

    assert!(matches!(err, DeployError::OutOfOrder(_)));
    Ok(())
}
