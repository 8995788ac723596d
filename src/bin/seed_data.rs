//! Seed data script - creates the first admin and optional demo catalog
//!
//! Run with: cargo run --bin seed-data -- --email admin@toko.id --password rahasia123 --sample
//!
//! This creates:
//! - one admin staff member with a login
//! - with `--sample`: 3 categories and 8 products

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};

use kasir_api::{
    auth::{DbIdentityProvider, IdentityProvider},
    db::{self, DbConfig},
    entities::StaffRole,
    errors::ServiceError,
    services::{
        catalog::{CategoryInput, CreateProductInput},
        staff::CreateStaffInput,
        CatalogService, StaffService,
    },
};

#[derive(Debug, Parser)]
#[command(name = "seed-data", about = "Create the first admin and demo catalog data")]
struct Cli {
    /// Database URL; falls back to DATABASE_URL
    #[arg(long)]
    database_url: Option<String>,

    #[arg(long, default_value = "admin@toko.id")]
    email: String,

    #[arg(long)]
    password: String,

    #[arg(long, default_value = "Administrator")]
    name: String,

    #[arg(long, default_value = "")]
    phone: String,

    /// Also create demo categories and products
    #[arg(long)]
    sample: bool,

    /// Run migrations before seeding
    #[arg(long)]
    migrate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();
    let url = match cli.database_url.clone() {
        Some(url) => url,
        None => std::env::var("DATABASE_URL").context("set --database-url or DATABASE_URL")?,
    };

    info!("=== kasir-api seed data ===");
    let db = db::establish_connection_with_config(&DbConfig {
        url,
        max_connections: 2,
        ..Default::default()
    })
    .await
    .context("failed to connect")?;
    if cli.migrate {
        db::run_migrations(&db).await?;
    }
    let db = Arc::new(db);

    let identities: Arc<dyn IdentityProvider> = Arc::new(DbIdentityProvider::new(db.clone()));
    let staff = StaffService::new(db.clone(), identities);

    match staff
        .create_staff(CreateStaffInput {
            name: cli.name.clone(),
            email: cli.email.clone(),
            phone: cli.phone.clone(),
            role: StaffRole::Admin,
            status: Some(true),
            password: Some(cli.password.clone()),
        })
        .await
    {
        Ok(admin) => info!(staff_id = %admin.id, email = %admin.email, "admin created"),
        Err(ServiceError::Conflict(msg)) => warn!("admin not created: {}", msg),
        Err(e) => return Err(e.into()),
    }

    if cli.sample {
        let catalog = CatalogService::new(db.clone());
        let count = create_sample_catalog(&catalog).await?;
        info!("  Created {} products", count);
    }

    info!("=== Seed data complete ===");
    info!("Log in with: curl -X POST http://localhost:8080/auth/login -H 'content-type: application/json' -d '{{\"email\":\"{}\",\"password\":\"...\"}}'", cli.email);
    Ok(())
}

async fn create_sample_catalog(catalog: &CatalogService) -> Result<usize> {
    let data: [(&str, &str, &[(&str, i64, i32, &str)]); 3] = [
        (
            "Minuman",
            "Minuman dingin dan panas",
            &[
                ("Teh Botol 350ml", 3500, 48, "8991002101630"),
                ("Kopi Susu Gula Aren", 18000, 20, "8990000000011"),
                ("Air Mineral 600ml", 3000, 60, "8886008101053"),
            ],
        ),
        (
            "Makanan",
            "Makanan ringan",
            &[
                ("Keripik Singkong", 8000, 25, "8990000000028"),
                ("Roti Cokelat", 6500, 8, "8990000000035"),
            ],
        ),
        (
            "Sembako",
            "Kebutuhan pokok",
            &[
                ("Gula Pasir 1kg", 15000, 30, "8990000000042"),
                ("Beras 5kg", 72000, 12, "8990000000059"),
                ("Minyak Goreng 1L", 17500, 5, "8990000000066"),
            ],
        ),
    ];

    let mut created = 0;
    for (category_name, description, products) in data {
        let category = catalog
            .create_category(CategoryInput {
                name: category_name.to_string(),
                description: Some(description.to_string()),
            })
            .await?;

        for (name, price, stock, barcode) in products {
            catalog
                .create_product(CreateProductInput {
                    name: name.to_string(),
                    price: *price,
                    stock: *stock,
                    category_id: category.id,
                    barcode: Some(barcode.to_string()),
                })
                .await?;
            created += 1;
        }
    }
    Ok(created)
}
