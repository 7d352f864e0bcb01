//! Development database sweep.
//!
//! Brings a development database into a usable state: every item gets an
//! inventory row, an empty catalogue is filled with demo items, and an admin
//! account exists. Run at startup when `DEV_MODE=true` and by `fnuc-cli seed`.

use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{info, instrument, warn};

use fnuc_core::{Email, InventoryLevels};

use crate::db::items::{self, NewItem};
use crate::db::users::NewUser;
use crate::db::{InventoryRepository, ItemRepository, RepositoryError, UserRepository, inventory};
use crate::services::auth::{AuthError, hash_password};

/// Address of the account created when no admin exists.
pub const DEFAULT_ADMIN_EMAIL: &str = "admin@example.com";
const DEFAULT_ADMIN_PASSWORD: &str = "admin";

/// A demo catalogue entry.
#[derive(Debug, Clone, Copy)]
pub struct SeedItem {
    pub name: &'static str,
    /// Whole currency units.
    pub price: i64,
    pub category: &'static str,
    pub image: &'static str,
    pub details: &'static str,
    pub price_id: &'static str,
    pub stock_quantity: i32,
    pub low_stock_threshold: i32,
}

impl SeedItem {
    fn new_item(&self) -> NewItem {
        NewItem {
            name: self.name.to_owned(),
            price: Decimal::from(self.price),
            category: self.category.to_owned(),
            image: self.image.to_owned(),
            details: self.details.to_owned(),
            price_id: self.price_id.to_owned(),
        }
    }

    const fn levels(&self) -> InventoryLevels {
        InventoryLevels {
            stock_quantity: self.stock_quantity,
            low_stock_threshold: self.low_stock_threshold,
            is_published: true,
        }
    }
}

/// Items seeded into an empty catalogue.
pub const DEFAULT_ITEMS: &[SeedItem] = &[
    SeedItem {
        name: "iPhone 12",
        price: 799,
        category: "Apple",
        image: "https://www.gizmochina.com/wp-content/uploads/2020/05/iphone-12-pro-max-family-hero-all-600x600.jpg",
        details: "6.1-inch OLED display<br>A14 Bionic chip<br>256GB storage",
        price_id: "price_1Jk8KjBZlBPWG6ECQXNqcKhR",
        stock_quantity: 5,
        low_stock_threshold: 1,
    },
    SeedItem {
        name: "iPhone 12 mini",
        price: 729,
        category: "Apple",
        image: "https://fdn2.gsmarena.com/vv/pics/apple/apple-iphone-12-mini-2.jpg",
        details: "5.4-inch Super Retina XDR display<br>Dual 12MP camera system<br>256 GB storage",
        price_id: "price_1Jk8LrBZlBPWG6ECvsEjYsZF",
        stock_quantity: 8,
        low_stock_threshold: 2,
    },
    SeedItem {
        name: "iPhone 11",
        price: 699,
        category: "Apple",
        image: "https://www.gizmochina.com/wp-content/uploads/2019/09/Apple-iPhone-11-1.jpg",
        details: "A13 Bionic chip<br>smart HDR<br>128GB storage",
        price_id: "price_1Jk8MUBZlBPWG6ECueOfWc9N",
        stock_quantity: 6,
        low_stock_threshold: 1,
    },
    SeedItem {
        name: "Acer Nitro 5",
        price: 1300,
        category: "Laptop",
        image: "/static/uploads/nitro.jpg",
        details: "Intel i7 10th gen<br>1920*1080 144Hz display<br>8 GB RAM<br>1 TB HDD + 256 GB SSD<br>GTX 1650 Graphics card",
        price_id: "price_1JlBEmBZlBPWG6EC1i6RYpTB",
        stock_quantity: 3,
        low_stock_threshold: 1,
    },
    SeedItem {
        name: "Apple MacBook Pro",
        price: 1990,
        category: "Laptop",
        image: "/static/uploads/macbook.jpg",
        details: "Intel core i5 2.4GHz<br>13.3\" Retina Display<br>8 GB RAM<br>256 GB SSD<br>Touch Bar + Touch id",
        price_id: "price_1JlBIQBZlBPWG6ECsPx49z0g",
        stock_quantity: 4,
        low_stock_threshold: 1,
    },
    SeedItem {
        name: "Mi TV 4X",
        price: 500,
        category: "Television",
        image: "/static/uploads/mi%20tv.jpg",
        details: "108Cm 43\" UHD 4K LED<br>Smart Android TV<br>20W speakers Dolby™+ DTS-HD®",
        price_id: "price_1JlBNABZlBPWG6ECzU6Yh1dq",
        stock_quantity: 7,
        low_stock_threshold: 2,
    },
];

/// What a sweep changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Inventory rows created for untracked items.
    pub backfilled: u64,
    /// Demo items inserted.
    pub seeded_items: usize,
    /// Whether the default admin was created.
    pub admin_created: bool,
}

/// Errors from the development sweep.
#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("could not create default admin: {0}")]
    Admin(#[from] AuthError),
}

impl From<sqlx::Error> for SeedError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

/// Run the development sweep. Safe to run repeatedly.
///
/// # Errors
///
/// Returns an error if a query fails or the admin password cannot be hashed.
#[instrument(skip(pool))]
pub async fn run_development_sweep(pool: &PgPool) -> Result<SweepReport, SeedError> {
    let backfilled = InventoryRepository::new(pool).backfill_missing().await?;

    let seeded_items = if ItemRepository::new(pool).count().await? == 0 {
        seed_default_items(pool).await?
    } else {
        0
    };

    let admin_created = seed_default_admin(pool).await?;

    let report = SweepReport {
        backfilled,
        seeded_items,
        admin_created,
    };
    info!(?report, "Development sweep finished");
    Ok(report)
}

async fn seed_default_items(pool: &PgPool) -> Result<usize, SeedError> {
    let mut tx = pool.begin().await?;
    for seed in DEFAULT_ITEMS {
        let item = items::insert_tx(&mut tx, &seed.new_item()).await?;
        inventory::insert_tx(&mut tx, item.id, &seed.levels()).await?;
    }
    tx.commit().await?;
    Ok(DEFAULT_ITEMS.len())
}

async fn seed_default_admin(pool: &PgPool) -> Result<bool, SeedError> {
    let users = UserRepository::new(pool);
    if users.admin_exists().await? {
        return Ok(false);
    }

    let email = Email::parse(DEFAULT_ADMIN_EMAIL)
        .map_err(|e| SeedError::Admin(AuthError::InvalidEmail(e)))?;
    let password_hash = hash_password(DEFAULT_ADMIN_PASSWORD)?;

    match users
        .create(&NewUser {
            name: "Admin",
            email: &email,
            password_hash: &password_hash,
            phone: "0000000000",
            is_admin: true,
            email_confirmed: true,
        })
        .await
    {
        Ok(_) => {
            warn!(
                email = DEFAULT_ADMIN_EMAIL,
                "Created default admin account with a well-known password; change it"
            );
            Ok(true)
        }
        // A non-admin account already owns the address.
        Err(RepositoryError::Conflict(_)) => {
            warn!(
                email = DEFAULT_ADMIN_EMAIL,
                "No admin exists and the default admin address is taken"
            );
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}
