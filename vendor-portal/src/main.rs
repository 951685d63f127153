//! vendor-portal: headless order desk for a signed-in vendor

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use portal_client::notification::{ConnectionState, NotificationClient};
use portal_client::{HttpClient, SessionStore};
use shared::{Order, OrderStatus, PaymentStatus, VendorProfile};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use vendor_portal::orders::{DateFilter, OrderFilter, OrderStateController, OrderStats};
use vendor_portal::{AppConfig, logger};

#[derive(Parser)]
#[command(name = "vendor-portal")]
#[command(about = "Live order desk for marketplace vendors")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// API base including `/api` (overrides PORTAL_API_BASE)
    #[arg(long, global = true)]
    api_base: Option<String>,

    /// Log level or filter directive (overrides LOG_LEVEL)
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load orders, follow the live stream and log changes until Ctrl-C
    Watch,
    /// List orders
    Orders {
        /// Case-insensitive match on id, number, customer name or phone
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long)]
        status: Option<OrderStatus>,
        #[arg(long)]
        payment: Option<PaymentStatus>,
        /// today | yesterday | week | month | YYYY-MM-DD..YYYY-MM-DD
        #[arg(long, value_parser = parse_date_filter, default_value = "all")]
        date: DateFilter,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Move an order to a new status
    Status { order_id: String, status: OrderStatus },
    /// Assign one of your delivery team to an order
    Assign {
        order_id: String,
        delivery_boy_id: String,
    },
    /// Store a session token and vendor profile
    Login {
        #[arg(long, env = "PORTAL_TOKEN")]
        token: String,
        /// Vendor profile JSON as returned by the login endpoint
        #[arg(long)]
        user_json: String,
    },
    /// Forget the stored session
    Logout,
}

fn parse_date_filter(value: &str) -> Result<DateFilter, String> {
    let filter = match value.trim().to_ascii_lowercase().as_str() {
        "" | "all" => DateFilter::All,
        "today" => DateFilter::Today,
        "yesterday" => DateFilter::Yesterday,
        "week" => DateFilter::Week,
        "month" => DateFilter::Month,
        range => {
            let (start, end) = range
                .split_once("..")
                .ok_or_else(|| format!("unknown date filter '{value}'"))?;
            let day = |s: &str| -> Result<Option<NaiveDate>, String> {
                if s.is_empty() {
                    return Ok(None);
                }
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .map(Some)
                    .map_err(|e| format!("bad date '{s}': {e}"))
            };
            DateFilter::Custom {
                start: day(start)?,
                end: day(end)?,
            }
        }
    };
    Ok(filter)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::from_env();
    if let Some(api_base) = cli.api_base {
        config.api_base = api_base;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    logger::init_logger(&config.log_level, config.log_dir.as_deref());

    let session = SessionStore::new(&config.data_dir);

    match cli.command.unwrap_or(Commands::Watch) {
        Commands::Login { token, user_json } => {
            let vendor: VendorProfile =
                serde_json::from_str(&user_json).context("Invalid vendor profile JSON")?;
            session.save_login(&token, &vendor)?;
            println!("Signed in as {} ({})", vendor.business_name, vendor.id);
            Ok(())
        }
        Commands::Logout => {
            session.clear()?;
            println!("Signed out");
            Ok(())
        }
        Commands::Orders {
            search,
            status,
            payment,
            date,
            json,
        } => {
            let controller = controller(&config, &session)?;
            controller.fetch_orders(false).await?;
            let filter = OrderFilter {
                search,
                status,
                payment,
                date,
            };
            let orders = controller.filtered_orders(&filter);
            if json {
                println!("{}", serde_json::to_string_pretty(&orders)?);
            } else {
                print_orders(&orders);
                print_stats(&controller.filtered_stats(&filter));
            }
            Ok(())
        }
        Commands::Status { order_id, status } => {
            let controller = controller(&config, &session)?;
            controller.fetch_orders(false).await?;
            controller.handle_status_update(&order_id, status).await?;
            println!("Order {order_id} is now {status}");
            Ok(())
        }
        Commands::Assign {
            order_id,
            delivery_boy_id,
        } => {
            let controller = controller(&config, &session)?;
            controller.fetch_vendor_profile().await?;
            controller.fetch_orders(false).await?;
            controller
                .handle_assign_delivery(&order_id, &delivery_boy_id)
                .await?;
            println!("Assigned {delivery_boy_id} to order {order_id}");
            Ok(())
        }
        Commands::Watch => watch(&config, &session).await,
    }
}

fn controller(config: &AppConfig, session: &SessionStore) -> Result<OrderStateController> {
    if !session.is_signed_in() {
        bail!("Not signed in; run `vendor-portal login` first");
    }
    let api = HttpClient::new(&config.portal_config())?;
    let mut controller = OrderStateController::new(Arc::new(api)).with_notice_ttl(config.notice_ttl);
    if let Some(vendor_id) = session.vendor_id() {
        controller = controller.with_vendor_id(vendor_id);
    }
    Ok(controller)
}

async fn watch(config: &AppConfig, session: &SessionStore) -> Result<()> {
    let vendor_id = session
        .vendor_id()
        .context("No vendor in session; run `vendor-portal login` first")?;

    let shutdown = CancellationToken::new();
    let controller = Arc::new(controller(config, session)?.with_cancel_token(shutdown.child_token()));

    if let Err(e) = controller.fetch_vendor_profile().await {
        tracing::warn!(error = %e, "Continuing without vendor profile");
    }
    let count = controller.fetch_orders(false).await.unwrap_or(0);
    tracing::info!(count, "Orders loaded");
    print_stats(&controller.stats());

    let client = NotificationClient::builder(config.portal_config()).build()?;
    let handles = controller.attach(&client);
    let mut status = client.subscribe_status();
    client.connect(vendor_id).await;

    let mut ticker = tokio::time::interval(Duration::from_secs(60));
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl-C received");
                break;
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *status.borrow_and_update();
                tracing::info!(badge = state.badge(), ?state, "Order stream");
                if state == ConnectionState::Disconnected {
                    tracing::warn!("Order stream offline, stopping");
                    break;
                }
            }
            _ = ticker.tick() => print_stats(&controller.stats()),
        }
    }

    shutdown.cancel();
    client.disconnect().await;
    for handle in handles {
        handle.unsubscribe();
    }
    Ok(())
}

fn print_orders(orders: &[Order]) {
    println!(
        "{:<14} {:<20} {:<18} {:>10} {:<10}",
        "ORDER", "CUSTOMER", "STATUS", "TOTAL", "PAYMENT"
    );
    for order in orders {
        println!(
            "{:<14} {:<20} {:<18} {:>10.2} {:<10}",
            order.order_number,
            order.customer.name,
            order.status,
            order.total_amount,
            order.payment_status
        );
    }
}

fn print_stats(stats: &OrderStats) {
    tracing::info!(
        total = stats.total,
        pending = stats.pending,
        processing = stats.processing,
        delivered = stats.delivered,
        cancelled = stats.cancelled,
        todays_revenue = stats.todays_revenue,
        "📊 Order stats"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_filter() {
        assert_eq!(parse_date_filter("Today").unwrap(), DateFilter::Today);
        assert_eq!(
            parse_date_filter("2024-05-01..").unwrap(),
            DateFilter::Custom {
                start: NaiveDate::from_ymd_opt(2024, 5, 1),
                end: None
            }
        );
        assert!(parse_date_filter("fortnight").is_err());
        assert!(parse_date_filter("2024-13-01..").is_err());
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from(["vendor-portal", "status", "o1", "out-for-delivery"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Status { status: OrderStatus::OutForDelivery, .. })
        ));
    }
}
