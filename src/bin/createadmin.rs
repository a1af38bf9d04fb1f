use bcrypt::{hash, DEFAULT_COST};
use dotenvy::dotenv;
use sqlx::{postgres::PgPoolOptions, Row};
use std::io::{self, Write};
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Repair Copilot - Create Admin");
    println!("=============================");

    dotenv().ok();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    print!("Login: ");
    io::stdout().flush()?;
    let mut login = String::new();
    io::stdin().read_line(&mut login)?;
    let login = login.trim().to_string();

    if login.is_empty() {
        eprintln!("❌ Login cannot be empty");
        return Ok(());
    }

    let existing_user = sqlx::query("SELECT id FROM users WHERE login = $1")
        .bind(&login)
        .fetch_optional(&pool)
        .await?;

    if existing_user.is_some() {
        eprintln!("❌ User with this login already exists");
        return Ok(());
    }

    print!("Password: ");
    io::stdout().flush()?;
    let password = rpassword::read_password()?;

    if password.len() < 6 {
        eprintln!("❌ Password must be at least 6 characters long");
        return Ok(());
    }

    print!("Password (again): ");
    io::stdout().flush()?;
    let password_confirm = rpassword::read_password()?;

    if password != password_confirm {
        eprintln!("❌ Passwords don't match");
        return Ok(());
    }

    let pass_hash = hash(&password, DEFAULT_COST)?;
    let daily_limit: i32 = std::env::var("DAILY_LIMIT_DEFAULT")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(100);

    let result = sqlx::query(
        "INSERT INTO users (id, login, pass_hash, is_admin, is_super_admin, \
         messages_per_day, messages_left_for_today, created_at, updated_at)
         VALUES ($1, $2, $3, true, true, $4, $4, NOW(), NOW())
         RETURNING id, login",
    )
    .bind(Uuid::new_v4())
    .bind(&login)
    .bind(&pass_hash)
    .bind(daily_limit)
    .fetch_one(&pool)
    .await;

    match result {
        Ok(row) => {
            let id: Uuid = row.get("id");
            let login: String = row.get("login");

            println!();
            println!("✅ Admin created successfully!");
            println!("   ID: {}", id);
            println!("   Login: {}", login);
            println!("   Admin: YES");
            println!("   Super admin: YES");
        }
        Err(e) => {
            eprintln!("❌ Failed to create admin: {}", e);
        }
    }

    pool.close().await;
    Ok(())
}
