use sqlx::PgPool;

const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS groups (
        id          UUID PRIMARY KEY,
        name        TEXT NOT NULL,
        priority    INTEGER NOT NULL DEFAULT 0 CHECK (priority >= 0),
        created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id          UUID PRIMARY KEY,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS applications (
        id          UUID PRIMARY KEY,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    // No foreign keys: memberships outlive deleted groups and users.
    r#"
    CREATE TABLE IF NOT EXISTS group_memberships (
        id          BIGSERIAL PRIMARY KEY,
        group_id    UUID NOT NULL,
        user_id     UUID NOT NULL,
        deleted     BOOLEAN NOT NULL DEFAULT false,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
        UNIQUE (group_id, user_id)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_group_memberships_user
    ON group_memberships (user_id) WHERE NOT deleted
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS group_global_grants (
        id          BIGSERIAL PRIMARY KEY,
        group_id    UUID NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
        kind        TEXT NOT NULL,
        allow       BOOLEAN NOT NULL,
        UNIQUE (group_id, kind)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS group_application_grants (
        id              BIGSERIAL PRIMARY KEY,
        group_id        UUID NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
        application_id  UUID,
        kind            TEXT NOT NULL,
        allow           BOOLEAN NOT NULL,
        UNIQUE NULLS NOT DISTINCT (group_id, application_id, kind)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS global_permission_caches (
        user_id     UUID PRIMARY KEY,
        permissions TEXT[] NOT NULL,
        created_at  TIMESTAMPTZ NOT NULL,
        updated_at  TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS application_permission_caches (
        user_id         UUID NOT NULL,
        application_id  UUID NOT NULL,
        permissions     TEXT[] NOT NULL,
        created_at      TIMESTAMPTZ NOT NULL,
        updated_at      TIMESTAMPTZ NOT NULL,
        PRIMARY KEY (user_id, application_id)
    )
    "#,
];

/// Creates every table and index. Safe to run repeatedly.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }
    tracing::info!(statements = STATEMENTS.len(), "migrations applied");
    Ok(())
}
