use clap::Parser;
use marketpay::application::engine::{CartItem, OrderEngine, SellerSummary};
use marketpay::config::EngineConfig;
use marketpay::domain::order::OrderId;
use marketpay::domain::ports::{Account, AuditLogBox, Listing, Role};
use marketpay::error::{OrderError, Result};
use marketpay::infrastructure::gateway::SimulatedGateway;
use marketpay::infrastructure::in_memory::{InMemoryAuditLog, InMemoryDirectory, InMemoryOrderStore};
#[cfg(feature = "storage-rocksdb")]
use marketpay::infrastructure::rocksdb::RocksDbStore;
use marketpay::interfaces::csv::command_reader::{Command, CommandReader, Op};
use marketpay::interfaces::csv::report_writer::ReportWriter;
use miette::{IntoDiagnostic, Result as CliResult};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Scenario CSV file to replay
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[cfg(feature = "storage-rocksdb")]
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Platform commission rate for direct-charge purchases (e.g. 0.10)
    #[arg(long)]
    commission_rate: Option<Decimal>,
}

fn required(field: Option<String>, name: &str) -> Result<String> {
    field
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| OrderError::Validation(format!("{name} is required")))
}

fn parse_role(value: &str) -> Result<Role> {
    match value {
        "buyer" => Ok(Role::Buyer),
        "seller" => Ok(Role::Seller),
        "admin" => Ok(Role::Admin),
        other => Err(OrderError::Validation(format!("unknown role: {other}"))),
    }
}

/// Resolves an order column: either `@N` (the N-th order created during
/// this run) or a literal order id.
fn resolve_order_ref(created: &[(OrderId, String)], reference: Option<String>) -> Result<OrderId> {
    let reference = required(reference, "order")?;
    if let Some(index) = reference.strip_prefix('@') {
        let n: usize = index
            .parse()
            .map_err(|_| OrderError::Validation(format!("invalid order reference: {reference}")))?;
        return created
            .get(n.wrapping_sub(1))
            .map(|(id, _)| *id)
            .ok_or_else(|| OrderError::Validation(format!("no order created yet for {reference}")));
    }
    reference.parse()
}

async fn apply_command(
    engine: &OrderEngine,
    directory: &InMemoryDirectory,
    carts: &mut HashMap<String, Vec<CartItem>>,
    created: &mut Vec<(OrderId, String)>,
    summaries: &mut Vec<SellerSummary>,
    cmd: Command,
) -> Result<()> {
    match cmd.op {
        Op::Account => {
            let role = parse_role(&required(cmd.value, "value")?)?;
            directory.add_account(Account {
                id: cmd.user.clone(),
                email: format!("{}@marketpay.test", cmd.user),
                role,
                payout_destination: cmd.payment_method.filter(|value| !value.is_empty()),
            });
        }
        Op::Listing => {
            let product = required(cmd.product, "product")?;
            let price: Decimal = required(cmd.value, "value")?
                .parse()
                .map_err(|_| OrderError::Validation("invalid listing price".to_string()))?;
            directory.add_listing(Listing {
                id: product.clone(),
                title: product,
                price,
                seller_id: cmd.user,
            });
        }
        Op::Add => {
            let product = required(cmd.product, "product")?;
            carts.entry(cmd.user).or_default().push(CartItem {
                product_id: product,
                quantity: cmd.quantity.unwrap_or(1),
            });
        }
        Op::Checkout => {
            let address = required(cmd.value, "value")?;
            let items = carts.remove(&cmd.user).unwrap_or_default();
            let order = engine.create_cart_order(&cmd.user, &items, &address).await?;
            created.push((order.id, cmd.user));
        }
        Op::Buy => {
            let product = required(cmd.product, "product")?;
            let payment_method = required(cmd.payment_method, "payment_method")?;
            let order = engine
                .create_direct_order(&cmd.user, &product, &payment_method)
                .await?;
            created.push((order.id, cmd.user));
        }
        Op::Cancel => {
            let id = resolve_order_ref(created, cmd.order)?;
            engine.cancel_order(&id, &cmd.user).await?;
        }
        Op::Dispute => {
            let id = resolve_order_ref(created, cmd.order)?;
            let reason = cmd.value.unwrap_or_default();
            engine.raise_dispute(&id, &cmd.user, &reason).await?;
        }
        Op::Update => {
            let id = resolve_order_ref(created, cmd.order)?;
            let value = required(cmd.value, "value")?;
            let (expected, new_status) = value.split_once(':').ok_or_else(|| {
                OrderError::Validation("update value must be expected:new".to_string())
            })?;
            engine
                .update_order(&id, &cmd.user, expected.parse()?, new_status.parse()?)
                .await?;
        }
        Op::Summary => {
            summaries.push(engine.seller_summary(&cmd.user).await?);
        }
    }
    Ok(())
}

async fn run(
    cli: &Cli,
    engine: OrderEngine,
    audit: AuditLogBox,
    directory: InMemoryDirectory,
) -> CliResult<()> {
    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = CommandReader::new(file);

    let mut carts: HashMap<String, Vec<CartItem>> = HashMap::new();
    let mut created: Vec<(OrderId, String)> = Vec::new();
    let mut summaries: Vec<SellerSummary> = Vec::new();

    for result in reader.commands() {
        match result {
            Ok(cmd) => {
                let op = cmd.op;
                if let Err(err) = apply_command(
                    &engine,
                    &directory,
                    &mut carts,
                    &mut created,
                    &mut summaries,
                    cmd,
                )
                .await
                {
                    warn!(?op, error = %err, "command failed");
                }
            }
            Err(err) => warn!(error = %err, "skipping malformed row"),
        }
    }

    let mut orders = Vec::new();
    for (id, buyer) in &created {
        match engine.get_order(id, buyer).await {
            Ok(order) => orders.push(order),
            Err(err) => warn!(order = %id, error = %err, "order missing from report"),
        }
    }
    let entries = audit.entries().await.into_diagnostic()?;

    let stdout = io::stdout();
    let mut report = ReportWriter::new(stdout.lock());
    report.write_orders(&orders).into_diagnostic()?;
    report.write_audit(&entries).into_diagnostic()?;
    if !summaries.is_empty() {
        report.write_seller_summaries(&summaries).into_diagnostic()?;
    }

    Ok(())
}

#[tokio::main]
async fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = EngineConfig {
        commission_rate: cli
            .commission_rate
            .unwrap_or(EngineConfig::default().commission_rate),
        ..EngineConfig::default()
    };
    let directory = InMemoryDirectory::new();
    let gateway = SimulatedGateway::new();

    #[cfg(feature = "storage-rocksdb")]
    if let Some(db_path) = &cli.db_path {
        let store = RocksDbStore::open(db_path).into_diagnostic()?;
        let engine = OrderEngine::new(
            Box::new(store.clone()),
            Box::new(store.clone()),
            Box::new(gateway.clone()),
            Box::new(directory.clone()),
            Box::new(directory.clone()),
            config.clone(),
        );
        return run(&cli, engine, Box::new(store), directory).await;
    }

    let audit = InMemoryAuditLog::new();
    let engine = OrderEngine::new(
        Box::new(InMemoryOrderStore::new()),
        Box::new(audit.clone()),
        Box::new(gateway),
        Box::new(directory.clone()),
        Box::new(directory.clone()),
        config,
    );
    run(&cli, engine, Box::new(audit), directory).await
}
