//! End-to-end tests for `airdrop run` and `airdrop diff` against a mocked
//! Guild API, the mock disperse adapter, and a ledger in a temp directory.

use std::path::{Path, PathBuf};

use airdrop_cli::diff::{run_diff, DiffArgs};
use airdrop_cli::run::{run_distribution, RunArgs};
use airdrop_cli::settings::ConfigArgs;
use airdrop_cli::{EXIT_CONFIG, EXIT_IN_FLIGHT, EXIT_OK};
use airdrop_core::{Address, TransferLeg};
use airdrop_ledger::{FileLedgerStore, JournalRecord, LedgerStore};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MEMBERS: [&str; 3] = [
    "0x1111111111111111111111111111111111111111",
    "0x2222222222222222222222222222222222222222",
    "0x3333333333333333333333333333333333333333",
];

async fn guild() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/guild/increment"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": 1985,
            "name": "Increment",
            "roles": [{ "id": 9494, "name": "Early", "members": MEMBERS }]
        })))
        .mount(&server)
        .await;
    server
}

fn write_config(dir: &Path, server: &MockServer, batch_size: usize) -> PathBuf {
    let path = dir.join("airdrop.yaml");
    let body = format!(
        r#"membership_endpoint: "{}"
token_amount: "1000"
batch_size: {batch_size}
token_address: "0xcc4304a31d09258b0029ea7fe63d032f52e44efe"
disperse_contract: "0xd152f549545093347a162dce210e7293f1452150"
sender: "0x00000000000000000000000000000000000000aa"
"#,
        server.uri()
    );
    std::fs::write(&path, body).unwrap();
    path
}

fn settings(config: PathBuf, ledger: PathBuf) -> ConfigArgs {
    ConfigArgs {
        config: Some(config),
        ledger,
    }
}

fn mock_run() -> RunArgs {
    RunArgs {
        dry_run: false,
        mock_disperse: true,
        json: false,
    }
}

#[tokio::test]
async fn mock_run_never_creates_the_ledger() {
    let server = guild().await;
    let dir = tempfile::tempdir().unwrap();
    let ledger = dir.path().join("DISTRIBUTIONS.csv");
    let settings = settings(write_config(dir.path(), &server, 2), ledger.clone());

    assert_eq!(run_distribution(&mock_run(), &settings).await.unwrap(), EXIT_OK);
    assert!(!ledger.exists());
    assert!(!dir.path().join("DISTRIBUTIONS.csv.inflight").exists());

    // Nothing was recorded, so a second rehearsal is just as clean.
    assert_eq!(run_distribution(&mock_run(), &settings).await.unwrap(), EXIT_OK);
    assert!(!ledger.exists());
}

#[tokio::test]
async fn mock_run_leaves_an_existing_ledger_byte_for_byte() {
    let server = guild().await;
    let dir = tempfile::tempdir().unwrap();
    let ledger = dir.path().join("DISTRIBUTIONS.csv");
    let original = format!("{}\n", MEMBERS[0]);
    std::fs::write(&ledger, &original).unwrap();
    let settings = settings(write_config(dir.path(), &server, 2), ledger.clone());

    assert_eq!(run_distribution(&mock_run(), &settings).await.unwrap(), EXIT_OK);

    assert_eq!(std::fs::read_to_string(&ledger).unwrap(), original);
    let store = FileLedgerStore::new(&ledger);
    assert_eq!(store.load().unwrap().ledger.len(), 1);
    assert!(store.journal().is_empty().unwrap());
}

#[tokio::test]
async fn dry_run_writes_nothing() {
    let server = guild().await;
    let dir = tempfile::tempdir().unwrap();
    let ledger = dir.path().join("DISTRIBUTIONS.csv");
    let settings = settings(write_config(dir.path(), &server, 2), ledger.clone());

    let args = RunArgs {
        dry_run: true,
        mock_disperse: true,
        json: true,
    };
    assert_eq!(run_distribution(&args, &settings).await.unwrap(), EXIT_OK);
    assert!(!ledger.exists());
}

#[tokio::test]
async fn invalid_config_exits_with_config_code() {
    let server = guild().await;
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(
        write_config(dir.path(), &server, 0),
        dir.path().join("DISTRIBUTIONS.csv"),
    );

    assert_eq!(run_distribution(&mock_run(), &settings).await.unwrap(), EXIT_CONFIG);
}

#[tokio::test]
async fn pending_journal_blocks_the_run() {
    let server = guild().await;
    let dir = tempfile::tempdir().unwrap();
    let ledger = dir.path().join("DISTRIBUTIONS.csv");
    let settings = settings(write_config(dir.path(), &server, 2), ledger.clone());

    let store = FileLedgerStore::new(&ledger);
    store
        .journal()
        .record(&JournalRecord::Submitted {
            run_id: uuid::Uuid::new_v4(),
            batch: 0,
            leg: TransferLeg::Token,
            recipients: vec![Address::parse(MEMBERS[0]).unwrap()],
            idempotency_key: "earlier".into(),
            at: chrono::Utc::now(),
        })
        .unwrap();

    // The relay endpoint is never contacted: the journal check comes first.
    let real_run = RunArgs {
        mock_disperse: false,
        ..mock_run()
    };
    assert_eq!(run_distribution(&real_run, &settings).await.unwrap(), EXIT_IN_FLIGHT);
    assert!(!ledger.exists());
}

#[tokio::test]
async fn diff_reads_without_writing() {
    let server = guild().await;
    let dir = tempfile::tempdir().unwrap();
    let ledger = dir.path().join("DISTRIBUTIONS.csv");
    std::fs::write(&ledger, format!("{}\n", MEMBERS[1])).unwrap();
    let settings = settings(write_config(dir.path(), &server, 2), ledger.clone());

    assert_eq!(run_diff(&DiffArgs { json: false }, &settings).await.unwrap(), EXIT_OK);
    assert_eq!(
        std::fs::read_to_string(&ledger).unwrap(),
        format!("{}\n", MEMBERS[1])
    );
}
