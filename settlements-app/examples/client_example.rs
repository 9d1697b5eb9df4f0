//! Client example demonstrating the plan catalog queries against a running
//! server backed by a temp SQLite database.
//!
//! Run with: cargo run -p settlements-app --example client_example --no-default-features --features sqlite

use std::net::SocketAddr;
use std::sync::Arc;

use settlements_client::SettlementsClient;
use settlements_hex::{
    SettlementService,
    inbound::HttpServer,
    outbound::{
        NotificationsHttpFacade, ProfilesHttpFacade, ServiceRequestsHttpFacade, StripeProvider,
        WorkOrdersHttpFacade,
    },
};
use settlements_repo::build_repo;
use tempfile::tempdir;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt().with_env_filter("info").init();

    // Find an available port
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr: SocketAddr = listener.local_addr()?;
    let port = addr.port();
    drop(listener);

    // Use a temp file-backed SQLite DB
    let tmp = tempdir()?;
    let db_path = tmp.path().join("settlements.db");
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());

    println!("🚀 Starting server on port {port}...");
    println!("   Database: {db_url}");

    // Build repository (handles connection, migration and plan seeding)
    let repo = build_repo(&db_url).await?;

    // Outbound adapters point at placeholder endpoints; the catalog flows
    // below never call out.
    let service = SettlementService::new(
        repo,
        Arc::new(StripeProvider::new("sk_test_placeholder")),
        Arc::new(ProfilesHttpFacade::new("http://localhost:5001")),
        Arc::new(WorkOrdersHttpFacade::new("http://localhost:5002")),
        Arc::new(ServiceRequestsHttpFacade::new("http://localhost:5003")),
        Arc::new(NotificationsHttpFacade::new("http://localhost:5004")),
        rust_decimal::Decimal::new(150, 1),
    );
    let server = HttpServer::new(service);
    let router = server.router();

    let server_addr = format!("127.0.0.1:{port}");
    tokio::spawn(async move {
        axum::serve(
            TcpListener::bind(&server_addr).await.unwrap(),
            router.into_make_service(),
        )
        .await
        .unwrap();
    });

    // Wait for server to start
    tokio::time::sleep(std::time::Duration::from_millis(500)).await;

    // Create client
    let base_url = format!("http://127.0.0.1:{port}");
    let client = SettlementsClient::new(&base_url);

    // ─────────────────────────────────────────────────────────────────────────
    // Demo: plan catalog queries
    // ─────────────────────────────────────────────────────────────────────────

    let health = client.health().await?;
    println!("✅ Server health: {health}");

    let owner_plans = client.list_plans("owner").await?;
    println!("\n📋 Owner plans:");
    for plan in &owner_plans {
        println!(
            "   - #{} {} (${}, up to {} units)",
            plan.id,
            plan.name,
            plan.price,
            plan.max_units.unwrap_or(0)
        );
    }

    let provider_plans = client.list_plans("provider").await?;
    println!("\n📋 Provider plans:");
    for plan in &provider_plans {
        match plan.max_clients {
            Some(max) => println!("   - #{} {} (${}, up to {} clients)", plan.id, plan.name, plan.price, max),
            None => println!("   - #{} {} (${}, unlimited clients)", plan.id, plan.name, plan.price),
        }
    }

    let standard = client.get_plan(2).await?;
    println!("\n✅ Plan #2: {} at ${}", standard.name, standard.price);

    // No payment exists yet for this work order
    let missing = client.service_payment_by_work_order(41).await;
    println!("✅ Payment lookup for unpaid work order: {}", missing.unwrap_err());

    println!("\n🎉 Example completed successfully!");

    Ok(())
}
