use clap::Parser;
use miette::{IntoDiagnostic, Result};
use pixelup::application::coordinator::UpscaleCoordinator;
use pixelup::application::reconciler::PaymentReconciler;
use pixelup::application::recovery::RecoverySweep;
use pixelup::domain::ports::{
    AccountStore, DynAccountStore, DynAuthorizationLog, DynReconciliationLedger,
};
use pixelup::domain::pricing::PricingPolicy;
use pixelup::error::UpscaleError;
use pixelup::infrastructure::in_memory::{
    InMemoryAccountStore, InMemoryAuthorizationLog, InMemoryPaymentProvider,
    InMemoryReconciliationLedger,
};
use pixelup::interfaces::csv::balance_writer::BalanceWriter;
use pixelup::interfaces::csv::operation_reader::{ComputeOutcome, Operation, OperationReader};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input billing journal CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Run the recovery sweep after the replay
    #[arg(long)]
    sweep: bool,
}

type Stores = (DynAccountStore, DynAuthorizationLog, DynReconciliationLedger);

#[cfg(feature = "storage-rocksdb")]
fn build_stores(db_path: Option<PathBuf>) -> Result<Stores> {
    use pixelup::infrastructure::rocksdb::RocksDbStore;

    if let Some(path) = db_path {
        let store = RocksDbStore::open(path).into_diagnostic()?;
        return Ok((
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store),
        ));
    }
    Ok(in_memory_stores())
}

#[cfg(not(feature = "storage-rocksdb"))]
fn build_stores(db_path: Option<PathBuf>) -> Result<Stores> {
    if db_path.is_some() {
        return Err(miette::miette!(
            "--db-path requires a build with the storage-rocksdb feature"
        ));
    }
    Ok(in_memory_stores())
}

fn in_memory_stores() -> Stores {
    (
        Arc::new(InMemoryAccountStore::new()),
        Arc::new(InMemoryAuthorizationLog::new()),
        Arc::new(InMemoryReconciliationLedger::new()),
    )
}

async fn replay(
    coordinator: &UpscaleCoordinator,
    reconciler: &PaymentReconciler,
    provider: &InMemoryPaymentProvider,
    accounts: &dyn AccountStore,
    operation: Operation,
) -> pixelup::error::Result<()> {
    match operation {
        Operation::Upscale {
            user,
            request,
            outcome,
        } => {
            accounts.open(user).await?;
            coordinator
                .execute(user, request, move |_| async move {
                    match outcome {
                        ComputeOutcome::Ok => Ok(Vec::new()),
                        ComputeOutcome::Failed => Err(UpscaleError::ComputeFailed(
                            "journaled compute failure".into(),
                        )),
                    }
                })
                .await?;
        }
        Operation::Topup {
            user,
            session,
            product,
            amount,
            paid,
        } => {
            accounts.open(user).await?;
            provider.put_session(session.clone(), paid).await;
            provider.put_product(product.clone(), amount).await;
            reconciler.reconcile(session, product, user).await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let (accounts, authorizations, ledger) = build_stores(cli.db_path)?;

    let provider = Arc::new(InMemoryPaymentProvider::new());
    let coordinator = UpscaleCoordinator::new(
        accounts.clone(),
        authorizations.clone(),
        PricingPolicy::default(),
    );
    let reconciler = PaymentReconciler::new(accounts.clone(), ledger.clone(), provider.clone());

    let file = File::open(cli.input).into_diagnostic()?;
    let reader = OperationReader::new(file);
    for row in reader.operations() {
        match row {
            Ok(operation) => {
                if let Err(e) =
                    replay(&coordinator, &reconciler, &provider, accounts.as_ref(), operation)
                        .await
                {
                    eprintln!("Error processing operation: {e}");
                }
            }
            Err(e) => {
                eprintln!("Error reading operation: {e}");
            }
        }
    }

    if cli.sweep {
        let sweep = RecoverySweep::new(accounts.clone(), authorizations, ledger);
        let report = sweep.run(chrono::Duration::zero()).await.into_diagnostic()?;
        eprintln!(
            "Sweep: {} stale authorizations refunded, {} reconciliation credits completed",
            report.authorizations_refunded, report.reconciliations_credited
        );
    }

    let balances = accounts.all().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = BalanceWriter::new(stdout.lock());
    writer.write_accounts(balances).into_diagnostic()?;

    Ok(())
}
