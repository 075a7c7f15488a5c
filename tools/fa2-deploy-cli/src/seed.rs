use std::io::Read as _;

use anyhow::Context as _;
use fa2_deploy_sdk::SeedPhrase;
use zeroize::Zeroizing;

#[derive(Clone, Debug, PartialEq, Eq)]
enum SeedSourceKind {
    Prompt,
    Stdin,
    File(String),
    Env(String),
}

fn parse_source(source: &str) -> SeedSourceKind {
    if let Some(rest) = source.strip_prefix("file:") {
        SeedSourceKind::File(rest.to_string())
    } else if let Some(rest) = source.strip_prefix("env:") {
        SeedSourceKind::Env(rest.to_string())
    } else if source == "stdin" {
        SeedSourceKind::Stdin
    } else {
        SeedSourceKind::Prompt
    }
}

/// Read a seed phrase from `prompt | stdin | file:/path | env:VAR`.
pub fn seed_from_source(source: &str) -> anyhow::Result<SeedPhrase> {
    let raw: Zeroizing<String> = match parse_source(source) {
        SeedSourceKind::Prompt => {
            Zeroizing::new(rpassword::prompt_password("enter seed phrase: ")?)
        }
        SeedSourceKind::Stdin => {
            let mut buf = Zeroizing::new(String::new());
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
        SeedSourceKind::File(path) => Zeroizing::new(
            std::fs::read_to_string(&path).with_context(|| format!("read {}", path))?,
        ),
        SeedSourceKind::Env(var) => Zeroizing::new(
            std::env::var(&var).with_context(|| format!("env {} not set", var))?,
        ),
    };
    let seed = SeedPhrase::new(raw.as_str()).context("invalid seed phrase")?;
    Ok(seed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write as _;

    const PHRASE: &str =
        "abandon ability able about above absent absorb abstract absurd abuse access accident";

    #[test]
    fn parses_source_kinds() {
        assert_eq!(parse_source("prompt"), SeedSourceKind::Prompt);
        assert_eq!(parse_source("stdin"), SeedSourceKind::Stdin);
        assert_eq!(
            parse_source("file:/tmp/seed"),
            SeedSourceKind::File("/tmp/seed".into())
        );
        assert_eq!(
            parse_source("env:FA2_DEPLOY_MNEMONIC"),
            SeedSourceKind::Env("FA2_DEPLOY_MNEMONIC".into())
        );
    }

    #[test]
    #[serial]
    fn reads_seed_from_env() {
        std::env::set_var("FA2_DEPLOY_TEST_SEED", PHRASE);
        let seed = seed_from_source("env:FA2_DEPLOY_TEST_SEED").unwrap();
        assert_eq!(seed.word_count(), 12);
        std::env::remove_var("FA2_DEPLOY_TEST_SEED");
    }

    #[test]
    #[serial]
    fn missing_env_is_an_error() {
        std::env::remove_var("FA2_DEPLOY_TEST_SEED");
        let err = seed_from_source("env:FA2_DEPLOY_TEST_SEED").unwrap_err();
        assert!(err.to_string().contains("FA2_DEPLOY_TEST_SEED"));
    }

    #[test]
    fn reads_seed_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{PHRASE}").unwrap();
        let source = format!("file:{}", file.path().display());
        assert_eq!(seed_from_source(&source).unwrap().expose(), PHRASE);
    }

    #[test]
    fn placeholder_phrase_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "MNEMONIC GOES HERE").unwrap();
        let source = format!("file:{}", file.path().display());
        assert!(seed_from_source(&source).is_err());
    }
}
