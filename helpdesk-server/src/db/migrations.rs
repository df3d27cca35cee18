//! Schema migrations
//!
//! Idempotent: every statement is `IF NOT EXISTS`, so `run` is safe to call
//! on every start.

use sqlx::PgPool;

/// Create all helpdesk tables and indexes.
pub async fn run(pool: &PgPool) -> Result<(), sqlx::Error> {
    tracing::info!("Running helpdesk migrations...");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            username TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL UNIQUE,
            first_name TEXT NOT NULL DEFAULT '',
            last_name TEXT NOT NULL DEFAULT '',
            role TEXT NOT NULL DEFAULT 'user'
                CHECK (role IN ('user', 'agent', 'admin')),
            phone_number TEXT,
            department TEXT,
            password_hash TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS auth_tokens (
            token TEXT PRIMARY KEY,
            user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            last_used_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tickets (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            title TEXT NOT NULL CHECK (char_length(title) BETWEEN 1 AND 200),
            description TEXT NOT NULL,
            priority TEXT NOT NULL DEFAULT 'medium'
                CHECK (priority IN ('low', 'medium', 'high')),
            status TEXT NOT NULL DEFAULT 'open'
                CHECK (status IN ('open', 'in_progress', 'resolved', 'closed', 'escalated')),
            created_by UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            assigned_to UUID REFERENCES users(id) ON DELETE SET NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            resolved_at TIMESTAMPTZ,
            escalation_date TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS comments (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            ticket_id UUID NOT NULL REFERENCES tickets(id) ON DELETE CASCADE,
            user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            content TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    create_indexes(pool).await?;

    tracing::info!("Helpdesk migrations complete");
    Ok(())
}

async fn create_indexes(pool: &PgPool) -> Result<(), sqlx::Error> {
    let statements = [
        "CREATE INDEX IF NOT EXISTS idx_auth_tokens_user ON auth_tokens(user_id)",
        "CREATE INDEX IF NOT EXISTS idx_tickets_created_by ON tickets(created_by)",
        "CREATE INDEX IF NOT EXISTS idx_tickets_assigned_to ON tickets(assigned_to)",
        "CREATE INDEX IF NOT EXISTS idx_tickets_created_at ON tickets(created_at DESC)",
        // Escalation sweep only ever scans tickets still being worked
        "CREATE INDEX IF NOT EXISTS idx_tickets_escalation_scan ON tickets(priority, updated_at) \
         WHERE status IN ('open', 'in_progress')",
        "CREATE INDEX IF NOT EXISTS idx_tickets_resolved_at ON tickets(resolved_at) \
         WHERE resolved_at IS NOT NULL",
        "CREATE INDEX IF NOT EXISTS idx_tickets_escalation_date ON tickets(escalation_date) \
         WHERE escalation_date IS NOT NULL",
        "CREATE INDEX IF NOT EXISTS idx_comments_ticket ON comments(ticket_id, created_at)",
    ];

    for statement in statements {
        sqlx::query(statement).execute(pool).await?;
    }

    Ok(())
}
