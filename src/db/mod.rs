use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};

const DEFAULT_TAGS: &[&str] = &[
    "AI",
    "Agriculture",
    "Algorithms",
    "Blockchain",
    "Cloud Computing",
    "Computer Vision",
    "Cybersecurity",
    "Data Science",
    "Deep Learning",
    "E-Commerce",
    "Education Technology",
    "Game Development",
    "Health",
    "Human-Computer Interaction",
    "Image Processing",
    "Machine Learning",
    "Mobile Development",
    "NLP",
    "Network Security",
    "Neural Networks",
    "Operating Systems",
    "Reinforcement Learning",
    "Robotics",
    "Software Engineering",
    "Web Development",
];

pub async fn init_db(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    migrate(&pool).await?;
    seed(&pool).await?;

    Ok(pool)
}

pub async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL UNIQUE,
            hashed_password TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS colleges (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS programs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            college_id INTEGER NOT NULL REFERENCES colleges(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tags (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS theses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            abstract TEXT NOT NULL,
            authors TEXT NOT NULL,
            adviser TEXT NULL,
            year_submitted INTEGER NOT NULL,
            uploader_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            college_id INTEGER NOT NULL REFERENCES colleges(id),
            program_id INTEGER NOT NULL REFERENCES programs(id),
            panel_score REAL NULL,
            pdf_path TEXT NULL,
            pdf_name TEXT NULL,
            view_count INTEGER NOT NULL DEFAULT 0,
            ss_paper_id TEXT NULL,
            created_at TEXT NOT NULL,
            modified_at TEXT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_theses_created_at ON theses (created_at)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_theses_uploader_id ON theses (uploader_id)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS thesis_tags (
            thesis_id INTEGER NOT NULL REFERENCES theses(id) ON DELETE CASCADE,
            tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
            PRIMARY KEY (thesis_id, tag_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Idempotent seed of the default tag vocabulary and the initial
/// college/program reference data.
pub async fn seed(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for name in DEFAULT_TAGS {
        sqlx::query("INSERT OR IGNORE INTO tags (name) VALUES (?)")
            .bind(name)
            .execute(pool)
            .await?;
    }

    let now = chrono::Utc::now();
    sqlx::query("INSERT OR IGNORE INTO colleges (name, created_at) VALUES (?, ?)")
        .bind("College of Science")
        .bind(now)
        .execute(pool)
        .await?;

    let (college_id,): (i64,) = sqlx::query_as("SELECT id FROM colleges WHERE name = ?")
        .bind("College of Science")
        .fetch_one(pool)
        .await?;

    for program in ["BS Information Technology", "BS Computer Science"] {
        sqlx::query("INSERT OR IGNORE INTO programs (name, college_id, created_at) VALUES (?, ?, ?)")
            .bind(program)
            .bind(college_id)
            .bind(now)
            .execute(pool)
            .await?;
    }

    Ok(())
}
