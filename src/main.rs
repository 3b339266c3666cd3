use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use delivery_desk::commands::products::{PriceField, ProductInput};
use delivery_desk::commands::{audit, dashboard, deliveries, products, session};
use delivery_desk::db::Database;
use delivery_desk::error::{DeskError, DeskResult};
use delivery_desk::models::Role;
use delivery_desk::services::api::HttpBackend;
use delivery_desk::services::state::{load_settings, AppState};
use delivery_desk::utils::parse_decimal;

#[derive(Parser, Debug)]
#[command(name = "deliverydesk", about = "Deliveries, products and analytics for the shop")]
struct Cli {
    /// Directory holding the local settings database.
    #[arg(long, env = "DELIVERY_DESK_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        role: String,
        #[arg(long)]
        password: String,
    },
    Logout,
    Whoami,
    SetPassword {
        role: String,
        #[arg(long)]
        password: String,
    },
    SetApiUrl {
        url: String,
    },
    SetCurrency {
        symbol: String,
    },
    Settings,
    Deliveries,
    Delivery {
        id: i64,
    },
    CreateDelivery {
        #[arg(long)]
        date: Option<String>,
        /// PRODUCT_ID=QUANTITY, repeatable.
        #[arg(long = "item", value_parser = parse_item)]
        items: Vec<(i64, f64)>,
    },
    Products,
    AddProduct {
        name: String,
        #[arg(long)]
        cost: String,
        #[arg(long)]
        sell: String,
        #[arg(long, default_value = "0")]
        quantity: String,
    },
    UpdateProduct {
        id: i64,
        /// `cost` or `sell`.
        field: String,
        value: String,
    },
    ToggleProduct {
        id: i64,
    },
    PriceHistory {
        product_id: i64,
    },
    MarkPaid {
        id: i64,
    },
    MarkUnpaid {
        id: i64,
    },
    Comment {
        delivery_id: i64,
        text: String,
    },
    AuditLog,
    Analytics {
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
    },
    SessionLog {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

fn parse_item(raw: &str) -> Result<(i64, f64), String> {
    let (id, qty) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected PRODUCT_ID=QUANTITY, got {}", raw))?;
    let id = id
        .trim()
        .parse::<i64>()
        .map_err(|e| format!("product id {}: {}", id, e))?;
    let qty = parse_decimal(qty).map_err(|e| e.to_string())?;
    Ok((id, qty))
}

fn amount(raw: &str) -> DeskResult<f64> {
    parse_decimal(raw).map_err(|_| DeskError::InvalidAmount(raw.to_string()))
}

fn role_arg(raw: &str) -> DeskResult<Role> {
    raw.parse::<Role>()
        .map_err(|_| DeskError::Internal(format!("unknown role {}", raw)))
}

fn to_json<T: Serialize>(value: &T) -> DeskResult<String> {
    serde_json::to_string_pretty(value).map_err(|e| DeskError::Internal(e.to_string()))
}

fn open_state(data_dir: &Path) -> Result<AppState> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Create data dir {}", data_dir.display()))?;
    let db_path = data_dir.join("delivery-desk.sqlite");
    let db = Database::new(&db_path).with_context(|| format!("Open {}", db_path.display()))?;

    let settings = load_settings(&db)?;
    let backend = HttpBackend::new(&settings.api_url)?;
    info!(api_url = %backend.endpoint(), "backend configured");
    Ok(AppState::init(db, Arc::new(backend))?)
}

async fn dispatch(state: &mut AppState, command: Command) -> DeskResult<String> {
    match command {
        Command::Login { role, password } => to_json(&session::login(state, &role, &password)?),
        Command::Logout => to_json(&session::logout(state)?),
        Command::Whoami => to_json(&session::whoami(state)?),
        Command::SetPassword { role, password } => {
            session::set_password(state, role_arg(&role)?, &password)?;
            to_json(&serde_json::json!({ "role": role_arg(&role)?, "updated": true }))
        }
        Command::SetApiUrl { url } => {
            session::set_api_url(state, &url)?;
            to_json(&state.settings)
        }
        Command::SetCurrency { symbol } => {
            session::set_currency_symbol(state, &symbol)?;
            to_json(&state.settings)
        }
        Command::Settings => to_json(&state.settings),
        Command::Deliveries => to_json(&deliveries::load_deliveries(state).await?),
        Command::Delivery { id } => to_json(&deliveries::load_delivery(state, id).await?),
        Command::CreateDelivery { date, items } => {
            let date = date.unwrap_or_default();
            to_json(&deliveries::create_delivery_with_quantities(state, &date, &items).await?)
        }
        Command::Products => to_json(&products::load_products(state).await?),
        Command::AddProduct {
            name,
            cost,
            sell,
            quantity,
        } => {
            let input = ProductInput {
                name,
                cost_price: amount(&cost)?,
                sell_price: amount(&sell)?,
                quantity: amount(&quantity)?,
            };
            to_json(&products::add_product(state, input).await?)
        }
        Command::UpdateProduct { id, field, value } => {
            let field: PriceField = field.parse()?;
            to_json(&products::update_product(state, id, field, amount(&value)?).await?)
        }
        Command::ToggleProduct { id } => to_json(&products::toggle_product_status(state, id).await?),
        Command::PriceHistory { product_id } => {
            to_json(&products::load_price_history(state, product_id).await?)
        }
        Command::MarkPaid { id } => to_json(&deliveries::mark_delivery_paid(state, id).await?),
        Command::MarkUnpaid { id } => to_json(&deliveries::mark_delivery_unpaid(state, id).await?),
        Command::Comment { delivery_id, text } => {
            to_json(&deliveries::add_comment(state, delivery_id, &text).await?)
        }
        Command::AuditLog => to_json(&audit::load_audit_log(state).await?),
        Command::Analytics { from, to } => {
            to_json(&dashboard::load_analytics(state, from.as_deref(), to.as_deref()).await?)
        }
        Command::SessionLog { limit } => to_json(&session::session_log(state, limit)?),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut state = match open_state(&cli.data_dir) {
        Ok(state) => state,
        Err(err) => {
            error!(error = %format!("{:#}", err), "startup failed");
            eprintln!("{:#}", err);
            return ExitCode::FAILURE;
        }
    };

    match dispatch(&mut state, cli.command).await {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "command failed");
            eprintln!("{}", err.user_message());
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn items_accept_decimal_commas() {
        assert_eq!(parse_item("7=2,5").unwrap(), (7, 2.5));
        assert!(parse_item("7").is_err());
        assert!(parse_item("x=1").is_err());
    }

    #[test]
    fn cli_parses_repeated_items() {
        let cli = Cli::try_parse_from([
            "deliverydesk",
            "create-delivery",
            "--date",
            "2024-03-01",
            "--item",
            "1=2",
            "--item",
            "4=0.5",
        ])
        .unwrap();
        match cli.command {
            Command::CreateDelivery { date, items } => {
                assert_eq!(date.as_deref(), Some("2024-03-01"));
                assert_eq!(items, vec![(1, 2.0), (4, 0.5)]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
