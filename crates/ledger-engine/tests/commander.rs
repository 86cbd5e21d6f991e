use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use async_trait::async_trait;
use ledger_engine::{
    CommandError, Commander, EngineConfig, ErrorKind, IngestionMode, Log, LogType, MemoryStore,
    Parameters, PersistenceHandle, RunScript, ScriptParser, Store, StoreError,
};
use ledger_numscript::syntax::{
    Destination, Expr, Overdraft, Script, SendAmount, Source, Span, StatementKind, VarDecl,
};
use ledger_numscript::{CompileError, CompileErrorKind, CompileErrors};
use ledger_types::{AccountWithVolumes, BigInt, Posting, REVERTS_METADATA_KEY};
use serde_json::json;

/// Maps script text to prebuilt syntax trees
struct Fixtures(HashMap<&'static str, Script>);

impl ScriptParser for Fixtures {
    fn parse(&self, plain: &str) -> Result<Script, CompileErrors> {
        self.0.get(plain.trim()).cloned().ok_or_else(|| {
            CompileError::new(
                CompileErrorKind::Syntax {
                    message: format!("unexpected input {plain:?}"),
                },
                Span::new(1, 1),
            )
            .into()
        })
    }
}

fn gem(amount: i64) -> SendAmount {
    SendAmount::Monetary(Expr::monetary("GEM", amount))
}

fn fixtures() -> Arc<Fixtures> {
    let mut scripts = HashMap::new();
    scripts.insert(
        "mint",
        Script::new().send(gem(100), Source::account("world"), Destination::account("mint")),
    );
    scripts.insert(
        "pay",
        Script::new()
            .var(VarDecl::new("monetary", "amount"))
            .var(VarDecl::new("account", "dest"))
            .send(
                SendAmount::Monetary(Expr::var("amount")),
                Source::account("mint"),
                Destination::Account(Expr::var("dest")),
            ),
    );
    scripts.insert(
        "drain",
        Script::new().send(
            SendAmount::All(Expr::asset("GEM")),
            Source::account("mint"),
            Destination::account("burn"),
        ),
    );
    scripts.insert(
        "overdrawn",
        Script::new().send(gem(1000), Source::account("mint"), Destination::account("alice")),
    );
    scripts.insert(
        "tag",
        Script::new()
            .send(gem(1), Source::account("world"), Destination::account("mint"))
            .statement(StatementKind::SetTxMeta {
                key: "kind".into(),
                value: Expr::string("tag"),
            })
            .statement(StatementKind::SetAccountMeta {
                account: Expr::account("mint"),
                key: "tier".into(),
                value: Expr::string("gold"),
            }),
    );
    scripts.insert(
        "no-postings",
        Script::new().statement(StatementKind::SetTxMeta {
            key: "k".into(),
            value: Expr::string("v"),
        }),
    );
    scripts.insert(
        "transfer",
        Script::new()
            .var(VarDecl::new("account", "from"))
            .var(VarDecl::new("account", "to"))
            .send(
                gem(10),
                Source::Account {
                    account: Expr::var("from"),
                    overdraft: Some(Overdraft::Unbounded),
                },
                Destination::Account(Expr::var("to")),
            ),
    );
    scripts.insert("fail", Script::new().statement(StatementKind::Fail));
    Arc::new(Fixtures(scripts))
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn commander_with(store: &MemoryStore, config: EngineConfig) -> Commander {
    init_tracing();
    Commander::new(Arc::new(store.clone()), fixtures(), config)
        .await
        .expect("commander starts")
}

async fn commander(store: &MemoryStore) -> Commander {
    commander_with(store, EngineConfig::default()).await
}

fn pay(amount: i64, dest: &str) -> RunScript {
    RunScript::new("pay")
        .with_var("amount", json!({"asset": "GEM", "amount": amount}))
        .with_var("dest", json!(dest))
}

async fn balance(commander: &Commander, address: &str) -> BigInt {
    commander
        .cache()
        .get(address)
        .await
        .expect("account loads")
        .balance("GEM")
}

fn kind<T: std::fmt::Debug>(result: Result<T, CommandError>) -> ErrorKind {
    result.expect_err("command fails").kind()
}

#[tokio::test]
async fn test_create_transaction_commits_postings() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    let commander = commander(&store).await;

    let tx = commander
        .create_transaction(Parameters::default(), RunScript::new("mint"))
        .await?;
    assert_eq!(tx.id, 0);
    assert_eq!(tx.postings, vec![Posting::new("world", "mint", "GEM", 100)]);

    assert_eq!(balance(&commander, "mint").await, BigInt::from(100));
    assert_eq!(store.compute_account("mint").await?.balance("GEM"), BigInt::from(100));
    assert_eq!(store.logs().await.len(), 1);
    assert!(store.verify_chain().await);
    assert_eq!(commander.state().in_flight(), 0);
    Ok(())
}

#[tokio::test]
async fn test_transaction_ids_increase() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    let commander = commander(&store).await;

    for expected in 0..3 {
        let tx = commander
            .create_transaction(Parameters::default(), RunScript::new("mint"))
            .await?;
        assert_eq!(tx.id, expected);
    }
    Ok(())
}

#[tokio::test]
async fn test_ids_continue_after_restart() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    commander(&store)
        .await
        .create_transaction(Parameters::default(), RunScript::new("mint"))
        .await?;

    let restarted = commander(&store).await;
    let tx = restarted
        .create_transaction(Parameters::default(), RunScript::new("mint"))
        .await?;
    assert_eq!(tx.id, 1);
    assert_eq!(balance(&restarted, "mint").await, BigInt::from(200));
    Ok(())
}

#[tokio::test]
async fn test_rejections_leave_no_trace() {
    let store = MemoryStore::new();
    let commander = commander(&store).await;

    let cases = [
        (RunScript::new("   "), ErrorKind::NoScript),
        (RunScript::new("not a script"), ErrorKind::CompilationFailed),
        (RunScript::new("no-postings"), ErrorKind::NoPostings),
        (RunScript::new("fail"), ErrorKind::ScriptFailed),
        (RunScript::new("overdrawn"), ErrorKind::InsufficientFunds),
        (RunScript::new("pay"), ErrorKind::MissingVariable),
    ];
    for (script, expected) in cases {
        let result = commander
            .create_transaction(Parameters::default(), script)
            .await;
        assert_eq!(kind(result), expected);
        assert_eq!(commander.state().in_flight(), 0);
    }
    assert!(store.logs().await.is_empty());
    assert_eq!(commander.state().predict_tx_id(), 0);
}

#[tokio::test]
async fn test_failed_transaction_releases_its_locks() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    let commander = commander_with(
        &store,
        EngineConfig {
            lock_timeout: Some(Duration::from_secs(1)),
            ..EngineConfig::default()
        },
    )
    .await;
    commander
        .create_transaction(Parameters::default(), RunScript::new("mint"))
        .await?;

    let overdrawn = commander
        .create_transaction(Parameters::default(), RunScript::new("overdrawn"))
        .await;
    assert_eq!(kind(overdrawn), ErrorKind::InsufficientFunds);

    // @mint is writable again
    commander
        .create_transaction(Parameters::default(), pay(40, "alice"))
        .await?;
    assert_eq!(balance(&commander, "mint").await, BigInt::from(60));
    assert_eq!(balance(&commander, "alice").await, BigInt::from(40));
    Ok(())
}

#[tokio::test]
async fn test_variables_are_bound_from_json() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    let commander = commander(&store).await;
    commander
        .create_transaction(Parameters::default(), RunScript::new("mint"))
        .await?;

    let tx = commander
        .create_transaction(Parameters::default(), pay(25, "users:042"))
        .await?;
    assert_eq!(tx.postings, vec![Posting::new("mint", "users:042", "GEM", 25)]);

    let wrong_type = commander
        .create_transaction(
            Parameters::default(),
            RunScript::new("pay")
                .with_var("amount", json!("twenty"))
                .with_var("dest", json!("alice")),
        )
        .await;
    assert_eq!(kind(wrong_type), ErrorKind::InvalidVariable);
    Ok(())
}

#[tokio::test]
async fn test_reference_must_be_unique() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    let commander = commander(&store).await;

    let tx = commander
        .create_transaction(
            Parameters::default(),
            RunScript::new("mint").with_reference("order-1"),
        )
        .await?;
    assert_eq!(tx.reference.as_deref(), Some("order-1"));

    let again = commander
        .create_transaction(
            Parameters::default(),
            RunScript::new("mint").with_reference("order-1"),
        )
        .await;
    assert_eq!(kind(again), ErrorKind::Conflict);
    assert_eq!(store.logs().await.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_past_timestamps_are_rejected() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    let commander = commander(&store).await;
    let now = Utc::now();

    commander
        .create_transaction(
            Parameters::default(),
            RunScript::new("mint").with_timestamp(now),
        )
        .await?;
    let past = commander
        .create_transaction(
            Parameters::default(),
            RunScript::new("mint").with_timestamp(now - chrono::Duration::hours(1)),
        )
        .await;
    assert_eq!(kind(past), ErrorKind::PastTransaction);
    Ok(())
}

#[tokio::test]
async fn test_past_timestamps_allowed_by_config() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    let commander = commander_with(
        &store,
        EngineConfig {
            allow_past_timestamps: true,
            ..EngineConfig::default()
        },
    )
    .await;
    let now = Utc::now();

    commander
        .create_transaction(
            Parameters::default(),
            RunScript::new("mint").with_timestamp(now),
        )
        .await?;
    let past = now - chrono::Duration::days(3);
    let tx = commander
        .create_transaction(
            Parameters::default(),
            RunScript::new("mint").with_timestamp(past),
        )
        .await?;
    assert_eq!(tx.timestamp, past);
    Ok(())
}

#[tokio::test]
async fn test_idempotency_key_replays_the_first_result() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    let commander = commander(&store).await;

    let first = commander
        .create_transaction(Parameters::with_idempotency_key("ik-1"), RunScript::new("mint"))
        .await?;
    let second = commander
        .create_transaction(Parameters::with_idempotency_key("ik-1"), RunScript::new("mint"))
        .await?;

    assert_eq!(first, second);
    assert_eq!(store.logs().await.len(), 1);
    assert_eq!(balance(&commander, "mint").await, BigInt::from(100));
    Ok(())
}

#[tokio::test]
async fn test_idempotency_key_bound_to_its_command() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    let commander = commander(&store).await;

    commander
        .save_account_metadata(
            Parameters::with_idempotency_key("ik-2"),
            "alice",
            [("tier".to_string(), "gold".to_string())].into(),
        )
        .await?;
    let reused = commander
        .create_transaction(Parameters::with_idempotency_key("ik-2"), RunScript::new("mint"))
        .await;
    assert_eq!(kind(reused), ErrorKind::Conflict);
    Ok(())
}

#[tokio::test]
async fn test_dry_run_commits_nothing() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    let commander = commander(&store).await;

    let preview = commander
        .create_transaction(Parameters::dry_run(), RunScript::new("mint"))
        .await?;
    assert_eq!(preview.id, 0);
    assert_eq!(preview.postings.len(), 1);
    assert!(store.logs().await.is_empty());
    assert_eq!(balance(&commander, "mint").await, BigInt::from(0));

    let tx = commander
        .create_transaction(Parameters::default(), RunScript::new("mint"))
        .await?;
    assert_eq!(tx.id, 0);
    Ok(())
}

#[tokio::test]
async fn test_revert_restores_balances() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    let commander = commander(&store).await;
    commander
        .create_transaction(Parameters::default(), RunScript::new("mint"))
        .await?;
    let payment = commander
        .create_transaction(Parameters::default(), pay(30, "alice"))
        .await?;

    let revert = commander
        .revert_transaction(Parameters::default(), payment.id, false, false)
        .await?;
    assert_eq!(revert.id, 2);
    assert_eq!(revert.postings, vec![Posting::new("alice", "mint", "GEM", 30)]);
    assert_eq!(revert.reverts(), Some(payment.id));
    assert_eq!(revert.metadata[REVERTS_METADATA_KEY], payment.id.to_string());

    assert_eq!(balance(&commander, "mint").await, BigInt::from(100));
    assert_eq!(balance(&commander, "alice").await, BigInt::from(0));

    let twice = commander
        .revert_transaction(Parameters::default(), payment.id, false, false)
        .await;
    assert_eq!(kind(twice), ErrorKind::AlreadyReverted);
    Ok(())
}

#[tokio::test]
async fn test_revert_of_unknown_transaction() {
    let store = MemoryStore::new();
    let commander = commander(&store).await;
    let result = commander
        .revert_transaction(Parameters::default(), 42, false, false)
        .await;
    assert_eq!(kind(result), ErrorKind::TransactionNotFound);
}

#[tokio::test]
async fn test_revert_needs_force_once_funds_moved_on() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    let commander = commander(&store).await;
    let minted = commander
        .create_transaction(Parameters::default(), RunScript::new("mint"))
        .await?;
    commander
        .create_transaction(Parameters::default(), RunScript::new("drain"))
        .await?;

    let refused = commander
        .revert_transaction(Parameters::default(), minted.id, false, false)
        .await;
    assert_eq!(kind(refused), ErrorKind::InsufficientFunds);

    commander
        .revert_transaction(Parameters::default(), minted.id, true, false)
        .await?;
    assert_eq!(balance(&commander, "mint").await, BigInt::from(-100));
    Ok(())
}

#[tokio::test]
async fn test_revert_at_effective_date_keeps_original_timestamp() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    let commander = commander_with(
        &store,
        EngineConfig {
            allow_past_timestamps: true,
            ..EngineConfig::default()
        },
    )
    .await;
    let minted = commander
        .create_transaction(Parameters::default(), RunScript::new("mint"))
        .await?;
    commander
        .create_transaction(Parameters::default(), RunScript::new("mint"))
        .await?;

    let revert = commander
        .revert_transaction(Parameters::default(), minted.id, false, true)
        .await?;
    assert_eq!(revert.timestamp, minted.timestamp);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_reverts_of_one_transaction() -> anyhow::Result<()> {
    let store = MemoryStore::new().with_ingestion(IngestionMode::Delayed(Duration::from_millis(100)));
    let commander = Arc::new(commander(&store).await);
    let minted = commander
        .create_transaction(Parameters::default(), RunScript::new("mint"))
        .await?;

    let first = tokio::spawn({
        let commander = commander.clone();
        async move {
            commander
                .revert_transaction(Parameters::default(), minted.id, false, false)
                .await
        }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    let second = commander
        .revert_transaction(Parameters::default(), minted.id, false, false)
        .await;

    assert!(first.await?.is_ok());
    let second = kind(second);
    assert!(
        second == ErrorKind::RevertOccurring || second == ErrorKind::AlreadyReverted,
        "unexpected {second:?}"
    );
    Ok(())
}

#[tokio::test]
async fn test_concurrent_payments_never_overspend() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    let commander = Arc::new(commander(&store).await);
    commander
        .create_transaction(Parameters::default(), RunScript::new("mint"))
        .await?;

    let payments = (0..15).map(|n| {
        let commander = commander.clone();
        tokio::spawn(async move {
            commander
                .create_transaction(Parameters::default(), pay(10, &format!("users:{n}")))
                .await
        })
    });
    let results = futures::future::join_all(payments).await;

    let mut committed = 0;
    for result in results {
        match result? {
            Ok(_) => committed += 1,
            Err(err) => assert_eq!(err.kind(), ErrorKind::InsufficientFunds),
        }
    }
    assert_eq!(committed, 10);
    assert_eq!(balance(&commander, "mint").await, BigInt::from(0));
    assert_eq!(
        store.compute_account("mint").await?.balance("GEM"),
        BigInt::from(0)
    );

    let mut ids: Vec<u64> = store
        .logs()
        .await
        .iter()
        .filter_map(|log| log.transaction().map(|tx| tx.id))
        .collect();
    let logged = ids.clone();
    ids.sort_unstable();
    assert_eq!(ids, logged, "ids follow log order");
    Ok(())
}

/// Projects logs right away but reports the append late
struct SlowAppend(MemoryStore);

#[async_trait]
impl Store for SlowAppend {
    async fn compute_account(&self, address: &str) -> Result<AccountWithVolumes, StoreError> {
        self.0.compute_account(address).await
    }

    async fn append_log(&self, log: Log) -> Result<PersistenceHandle, StoreError> {
        let handle = self.0.append_log(log).await?;
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok(handle)
    }

    async fn read_last_log_with_type(&self, types: &[LogType]) -> Result<Log, StoreError> {
        self.0.read_last_log_with_type(types).await
    }

    async fn read_log_with_idempotency_key(&self, key: &str) -> Result<Log, StoreError> {
        self.0.read_log_with_idempotency_key(key).await
    }

    async fn read_log_for_created_transaction(&self, id: u64) -> Result<Log, StoreError> {
        self.0.read_log_for_created_transaction(id).await
    }

    async fn read_log_for_created_transaction_with_reference(
        &self,
        reference: &str,
    ) -> Result<Log, StoreError> {
        self.0
            .read_log_for_created_transaction_with_reference(reference)
            .await
    }

    async fn read_log_for_reverted_transaction(&self, id: u64) -> Result<Log, StoreError> {
        self.0.read_log_for_reverted_transaction(id).await
    }
}

#[tokio::test]
async fn test_reads_during_commit_do_not_double_count() -> anyhow::Result<()> {
    init_tracing();
    let store = MemoryStore::new();
    let commander = Arc::new(
        Commander::new(
            Arc::new(SlowAppend(store.clone())),
            fixtures(),
            EngineConfig::default(),
        )
        .await?,
    );

    let minting = {
        let commander = commander.clone();
        tokio::spawn(async move {
            commander
                .create_transaction(Parameters::default(), RunScript::new("mint"))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(balance(&commander, "mint").await, BigInt::from(100));
    minting.await??;

    assert_eq!(balance(&commander, "mint").await, BigInt::from(100));
    assert_eq!(store.compute_account("mint").await?.balance("GEM"), BigInt::from(100));

    let overspend = commander
        .create_transaction(Parameters::default(), pay(150, "bob"))
        .await;
    assert_eq!(kind(overspend), ErrorKind::InsufficientFunds);
    Ok(())
}

fn transfer(from: &str, to: &str) -> RunScript {
    RunScript::new("transfer")
        .with_var("from", json!(from))
        .with_var("to", json!(to))
}

/// Runs both transfers concurrently and returns the total wall time
async fn run_pair(commander: &Arc<Commander>, first: RunScript, second: RunScript) -> Duration {
    let started = std::time::Instant::now();
    let handles = [first, second].map(|script| {
        let commander = commander.clone();
        tokio::spawn(async move {
            commander
                .create_transaction(Parameters::default(), script)
                .await
        })
    });
    for handle in handles {
        handle.await.expect("task joins").expect("transfer commits");
    }
    started.elapsed()
}

#[tokio::test]
async fn test_shared_accounts_serialize_disjoint_ones_overlap() {
    let store = MemoryStore::new().with_ingestion(IngestionMode::Delayed(Duration::from_millis(200)));
    let commander = Arc::new(commander(&store).await);

    let disjoint = run_pair(&commander, transfer("a", "b"), transfer("c", "d")).await;
    assert!(disjoint < Duration::from_millis(390), "took {disjoint:?}");

    let shared = run_pair(&commander, transfer("e", "f"), transfer("e", "g")).await;
    assert!(shared >= Duration::from_millis(400), "took {shared:?}");
    assert_eq!(balance(&commander, "e").await, BigInt::from(-20));
}

#[tokio::test]
async fn test_lock_wait_times_out() -> anyhow::Result<()> {
    let store = MemoryStore::new().with_ingestion(IngestionMode::Delayed(Duration::from_millis(300)));
    let commander = Arc::new(
        commander_with(
            &store,
            EngineConfig {
                lock_timeout: Some(Duration::from_millis(50)),
                ..EngineConfig::default()
            },
        )
        .await,
    );
    commander
        .create_transaction(Parameters::default(), RunScript::new("mint"))
        .await?;

    // holds @mint until its log is ingested
    let holder = tokio::spawn({
        let commander = commander.clone();
        async move {
            commander
                .create_transaction(Parameters::default(), pay(10, "alice"))
                .await
        }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let blocked = commander
        .create_transaction(Parameters::default(), pay(10, "bob"))
        .await;
    assert_eq!(kind(blocked), ErrorKind::Timeout);
    assert!(holder.await?.is_ok());
    Ok(())
}

#[tokio::test]
async fn test_async_mode_releases_after_ingestion() -> anyhow::Result<()> {
    let store = MemoryStore::new().with_ingestion(IngestionMode::Delayed(Duration::from_millis(50)));
    let commander = commander(&store).await;
    let params = Parameters {
        async_mode: true,
        ..Parameters::default()
    };

    commander
        .create_transaction(params.clone(), RunScript::new("mint"))
        .await?;
    assert_eq!(commander.state().in_flight(), 1);

    // waits for the first transaction's locks
    commander
        .create_transaction(Parameters::default(), pay(10, "alice"))
        .await?;
    assert_eq!(balance(&commander, "mint").await, BigInt::from(90));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(commander.state().in_flight(), 0);
    Ok(())
}

#[tokio::test]
async fn test_script_and_request_metadata() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    let commander = commander(&store).await;

    let tx = commander
        .create_transaction(
            Parameters::default(),
            RunScript::new("tag").with_metadata("source", "api"),
        )
        .await?;
    assert_eq!(tx.metadata["kind"], "tag");
    assert_eq!(tx.metadata["source"], "api");

    let mint = commander.cache().get("mint").await?;
    assert_eq!(mint.metadata["tier"], "gold");
    assert_eq!(store.compute_account("mint").await?.metadata["tier"], "gold");

    let clash = commander
        .create_transaction(
            Parameters::default(),
            RunScript::new("tag").with_metadata("kind", "other"),
        )
        .await;
    assert_eq!(kind(clash), ErrorKind::MetadataOverride);
    Ok(())
}

#[tokio::test]
async fn test_metadata_commands() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    let commander = commander(&store).await;
    let tx = commander
        .create_transaction(Parameters::default(), RunScript::new("mint"))
        .await?;
    commander.cache().get("mint").await?;

    commander
        .save_account_metadata(
            Parameters::default(),
            "mint",
            [("region".to_string(), "eu".to_string())].into(),
        )
        .await?;
    assert_eq!(commander.cache().get("mint").await?.metadata["region"], "eu");

    commander
        .delete_account_metadata(Parameters::default(), "mint", "region")
        .await?;
    assert!(commander.cache().get("mint").await?.metadata.is_empty());
    assert!(store.compute_account("mint").await?.metadata.is_empty());

    commander
        .save_transaction_metadata(
            Parameters::default(),
            tx.id,
            [("note".to_string(), "first".to_string())].into(),
        )
        .await?;
    let stored = store.transaction(tx.id).await.expect("transaction stored");
    assert_eq!(stored.metadata["note"], "first");

    commander
        .delete_transaction_metadata(Parameters::default(), tx.id, "note")
        .await?;
    let stored = store.transaction(tx.id).await.expect("transaction stored");
    assert!(stored.metadata.is_empty());

    let missing = commander
        .save_transaction_metadata(Parameters::default(), 99, Default::default())
        .await;
    assert_eq!(kind(missing), ErrorKind::TransactionNotFound);
    assert_eq!(store.logs().await.len(), 5);
    Ok(())
}
