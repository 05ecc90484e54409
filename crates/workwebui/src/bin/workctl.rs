use chrono::Utc;
use serde_json::json;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::env;
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 3 {
        eprintln!(
            "workctl <command> <namespace>\n\
             Commands:\n\
             - reset <namespace>\n\
             - seed <namespace> [n]\n\
             - counts <namespace>\n\
             \n\
             Uses DATABASE_URL or TEST_DATABASE_URL.\n"
        );
        std::process::exit(2);
    }

    dotenvy::dotenv().ok();
    let url = env::var("DATABASE_URL")
        .or_else(|_| env::var("TEST_DATABASE_URL"))
        .map_err(|_| anyhow::anyhow!("DATABASE_URL or TEST_DATABASE_URL must be set"))?;

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let ns = args[2].as_str();
    match args[1].as_str() {
        "reset" => reset(&pool, ns).await?,
        "seed" => {
            let n: i64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(10);
            seed(&pool, ns, n).await?;
            show_counts(&pool, ns).await?;
        }
        "counts" => show_counts(&pool, ns).await?,
        other => {
            eprintln!("Unknown command: {other}");
            std::process::exit(2);
        }
    }

    Ok(())
}

async fn reset(pool: &PgPool, ns: &str) -> anyhow::Result<()> {
    let mut tx = pool.begin().await?;
    for table in [
        "work_jobs",
        "work_known_jobs",
        "work_worker_pools",
        "work_worker_observations",
    ] {
        sqlx::query(&format!("DELETE FROM {table} WHERE namespace = $1"))
            .bind(ns)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    println!("reset {ns} OK");
    Ok(())
}

/// `n` jobs spread over every set, plus one pool of two workers with one busy.
async fn seed(pool: &PgPool, ns: &str, n: i64) -> anyhow::Result<()> {
    let now = Utc::now().timestamp();
    let names = ["send_email", "resize_image"];

    for name in names {
        sqlx::query(
            "INSERT INTO work_known_jobs (namespace, name) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(ns)
        .bind(name)
        .execute(pool)
        .await?;
    }

    for i in 0..n {
        let name = names[(i as usize) % names.len()];
        let job_id = Uuid::new_v4().simple().to_string();
        let enqueued_at = now - 600 + i;

        let (state, score, fails, last_err, failed_at) = match i % 4 {
            0 => ("queued", enqueued_at, 0_i64, None, None),
            1 => ("scheduled", now + 300 + i, 0, None, None),
            2 => ("retry", now + 60 + i, 1, Some("connection reset"), Some(now - 5)),
            _ => ("dead", now - 60 + i, 25, Some("gave up"), Some(now - 60 + i)),
        };

        sqlx::query(
            r#"
            INSERT INTO work_jobs
                (namespace, job_id, name, enqueued_at, args, fails, last_err, failed_at, state, score)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(ns)
        .bind(&job_id)
        .bind(name)
        .bind(enqueued_at)
        .bind(json!({ "n": i }))
        .bind(fails)
        .bind(last_err)
        .bind(failed_at)
        .bind(state)
        .bind(score)
        .execute(pool)
        .await?;

        println!("+ {state} {name} id={job_id}");
    }

    let pool_id = Uuid::new_v4().simple().to_string();
    let workers = vec![
        Uuid::new_v4().simple().to_string(),
        Uuid::new_v4().simple().to_string(),
    ];

    sqlx::query(
        r#"
        INSERT INTO work_worker_pools
            (namespace, worker_pool_id, started_at, heartbeat_at, job_names, concurrency, host, pid, worker_ids)
        VALUES ($1, $2, $3, $3, $4, $5, 'localhost', $6, $7)
        "#,
    )
    .bind(ns)
    .bind(&pool_id)
    .bind(now)
    .bind(names.iter().map(|s| s.to_string()).collect::<Vec<_>>())
    .bind(workers.len() as i64)
    .bind(i64::from(std::process::id()))
    .bind(&workers)
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO work_worker_observations
            (namespace, worker_id, job_name, job_id, started_at, args_json)
        VALUES ($1, $2, $3, $4, $5, '{}')
        "#,
    )
    .bind(ns)
    .bind(&workers[0])
    .bind(names[0])
    .bind(Uuid::new_v4().simple().to_string())
    .bind(now - 3)
    .execute(pool)
    .await?;

    println!("+ worker pool {pool_id} with {} workers", workers.len());
    Ok(())
}

async fn show_counts(pool: &PgPool, ns: &str) -> anyhow::Result<()> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        r#"
        SELECT state, COUNT(*)
        FROM work_jobs
        WHERE namespace = $1
        GROUP BY state
        ORDER BY state
        "#,
    )
    .bind(ns)
    .fetch_all(pool)
    .await?;

    let get = |s: &str| rows.iter().find(|(k, _)| k == s).map(|(_, c)| *c).unwrap_or(0);
    println!(
        "{ns}: queued={} scheduled={} retry={} dead={}",
        get("queued"),
        get("scheduled"),
        get("retry"),
        get("dead")
    );
    Ok(())
}
