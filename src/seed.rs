// src/seed.rs

use sqlx::SqlitePool;

use crate::{config::Config, error::AppError, utils::hash::hash_password};

/// Communities every fresh forum starts with.
pub const DEFAULT_COMMUNITIES: [(&str, &str); 4] = [
    ("General Discussion", "Talk about anything and everything"),
    ("Tech Talk", "Technology discussions and news"),
    ("Gaming", "Gaming related topics and reviews"),
    ("Programming", "Code, development, and programming help"),
];

/// Creates the configured admin account unless the username is already taken.
pub async fn seed_admin_user(pool: &SqlitePool, config: &Config) -> Result<(), AppError> {
    let (Some(username), Some(password)) = (&config.admin_username, &config.admin_password) else {
        return Ok(());
    };

    let user_exists = sqlx::query("SELECT id FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?;

    if user_exists.is_none() {
        tracing::info!("Seeding admin user: {}", username);
        let hashed_password = hash_password(password)?;
        let email = config
            .admin_email
            .clone()
            .unwrap_or_else(|| format!("{username}@forum.local"))
            .to_lowercase();

        sqlx::query(
            "INSERT INTO users (username, email, password, role, bio) VALUES (?, ?, ?, 'admin', ?)",
        )
        .bind(username)
        .bind(&email)
        .bind(&hashed_password)
        .bind("Forum Administrator")
        .execute(pool)
        .await?;
        tracing::info!("Admin user created successfully.");
    }
    Ok(())
}

/// Inserts any missing default community, owned by the first admin if there is one.
/// Returns how many were created.
pub async fn seed_default_communities(pool: &SqlitePool) -> Result<u64, AppError> {
    let owner: Option<i64> =
        sqlx::query_scalar("SELECT id FROM users WHERE role = 'admin' ORDER BY id LIMIT 1")
            .fetch_optional(pool)
            .await?;

    let mut created = 0;
    for (name, description) in DEFAULT_COMMUNITIES {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO communities (name, description, created_by) VALUES (?, ?, ?)",
        )
        .bind(name)
        .bind(description)
        .bind(owner)
        .execute(pool)
        .await?;
        created += result.rows_affected();
    }

    if created > 0 {
        tracing::info!("Seeded {} default communities", created);
    }
    Ok(created)
}

/// Runs every seed step enabled by `config`.
pub async fn run(pool: &SqlitePool, config: &Config) -> Result<(), AppError> {
    seed_admin_user(pool, config).await?;
    if config.seed_communities {
        seed_default_communities(pool).await?;
    }
    Ok(())
}
