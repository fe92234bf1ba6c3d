//! Ledger schema: accounts, transactions, entries, crypto details and the
//! link targets transactions may reference.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: ENUMS
        // ============================================================
        db.execute_unprepared(ENUMS_SQL).await?;

        // ============================================================
        // PART 2: LINK TARGETS
        // ============================================================
        db.execute_unprepared(LINK_TARGETS_SQL).await?;

        // ============================================================
        // PART 3: ACCOUNTS & LEDGER
        // ============================================================
        db.execute_unprepared(ACCOUNTS_SQL).await?;
        db.execute_unprepared(TRANSACTIONS_SQL).await?;
        db.execute_unprepared(TRANSACTION_ENTRIES_SQL).await?;

        // ============================================================
        // PART 4: CRYPTO OVERLAY
        // ============================================================
        db.execute_unprepared(CRYPTO_DETAILS_SQL).await?;

        // ============================================================
        // PART 5: TRIGGERS
        // ============================================================
        db.execute_unprepared(TRIGGERS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const ENUMS_SQL: &str = r"
CREATE TYPE account_kind AS ENUM ('bank', 'crypto', 'cash', 'investment');

CREATE TYPE transaction_type AS ENUM ('income', 'expense', 'transfer');

-- draft -> pending -> completed, or cancelled
CREATE TYPE transaction_status AS ENUM ('draft', 'pending', 'completed', 'cancelled');

CREATE TYPE entry_direction AS ENUM ('debit', 'credit');

CREATE TYPE rate_origin AS ENUM ('live', 'fallback');
";

const LINK_TARGETS_SQL: &str = r"
CREATE TABLE projects (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    name VARCHAR(255) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE categories (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    name VARCHAR(255) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE counterparties (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    name VARCHAR(255) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
";

const ACCOUNTS_SQL: &str = r"
CREATE TABLE accounts (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    name VARCHAR(255) NOT NULL,
    kind account_kind NOT NULL,
    currency VARCHAR(5) NOT NULL,
    balance NUMERIC(28, 8) NOT NULL DEFAULT 0,
    is_active BOOLEAN NOT NULL DEFAULT true,
    version BIGINT NOT NULL DEFAULT 0,
    description TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_account_version CHECK (version >= 0)
);

CREATE INDEX idx_accounts_kind ON accounts(kind) WHERE is_active;
";

const TRANSACTIONS_SQL: &str = r"
CREATE TABLE transactions (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    description TEXT NOT NULL,
    transaction_type transaction_type NOT NULL,
    status transaction_status NOT NULL DEFAULT 'draft',
    total_amount NUMERIC(28, 8) NOT NULL,
    transaction_date DATE NOT NULL,
    project_id UUID REFERENCES projects(id) ON DELETE RESTRICT,
    category_id UUID REFERENCES categories(id) ON DELETE RESTRICT,
    counterparty_id UUID REFERENCES counterparties(id) ON DELETE RESTRICT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_total_positive CHECK (total_amount > 0)
);

CREATE INDEX idx_txn_date ON transactions(transaction_date);
CREATE INDEX idx_txn_status ON transactions(status);
";

const TRANSACTION_ENTRIES_SQL: &str = r"
CREATE TABLE transaction_entries (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    transaction_id UUID NOT NULL REFERENCES transactions(id) ON DELETE CASCADE,
    account_id UUID NOT NULL REFERENCES accounts(id) ON DELETE RESTRICT,
    line_no INTEGER NOT NULL,
    direction entry_direction NOT NULL,
    amount NUMERIC(28, 8) NOT NULL,
    note VARCHAR(500),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_entry_amount_positive CHECK (amount > 0),
    UNIQUE (transaction_id, line_no)
);

CREATE INDEX idx_entries_transaction ON transaction_entries(transaction_id);
CREATE INDEX idx_entries_account ON transaction_entries(account_id);
";

const CRYPTO_DETAILS_SQL: &str = r"
CREATE TABLE crypto_transaction_details (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    transaction_id UUID NOT NULL UNIQUE REFERENCES transactions(id) ON DELETE CASCADE,
    currency VARCHAR(5) NOT NULL,
    network VARCHAR(50) NOT NULL,
    foreign_amount NUMERIC(28, 8) NOT NULL,
    rate NUMERIC(28, 12) NOT NULL,
    rate_origin rate_origin NOT NULL,
    external_ref VARCHAR(128),
    wallet_from VARCHAR(128),
    wallet_to VARCHAR(128),
    fee NUMERIC(28, 8),
    block_number BIGINT,
    confirmation_count INTEGER NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_foreign_amount_positive CHECK (foreign_amount > 0),
    CONSTRAINT chk_rate_positive CHECK (rate > 0),
    CONSTRAINT chk_fee_non_negative CHECK (fee IS NULL OR fee >= 0)
);

CREATE INDEX idx_crypto_external_ref ON crypto_transaction_details(external_ref)
    WHERE external_ref IS NOT NULL;
";

const TRIGGERS_SQL: &str = r"
-- ============================================================
-- FUNCTION: prevent_final_modification
-- Completed and cancelled transactions are final
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_final_modification()
RETURNS TRIGGER AS $$
BEGIN
    IF OLD.status IN ('completed', 'cancelled') THEN
        RAISE EXCEPTION 'Cannot modify % transaction %', OLD.status, OLD.id;
    END IF;

    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_prevent_final_mod
BEFORE UPDATE ON transactions
FOR EACH ROW
EXECUTE FUNCTION prevent_final_modification();

-- ============================================================
-- FUNCTION: prevent_non_draft_delete
-- Only drafts may be deleted
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_non_draft_delete()
RETURNS TRIGGER AS $$
BEGIN
    IF OLD.status <> 'draft' THEN
        RAISE EXCEPTION 'Can only delete draft transactions';
    END IF;

    RETURN OLD;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_prevent_non_draft_delete
BEFORE DELETE ON transactions
FOR EACH ROW
EXECUTE FUNCTION prevent_non_draft_delete();

-- ============================================================
-- FUNCTION: prevent_entry_update
-- Entries never change once written
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_entry_update()
RETURNS TRIGGER AS $$
BEGIN
    RAISE EXCEPTION 'Transaction entries are immutable';
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_prevent_entry_update
BEFORE UPDATE ON transaction_entries
FOR EACH ROW
EXECUTE FUNCTION prevent_entry_update();
";

const DROP_ALL_SQL: &str = r"
DROP TRIGGER IF EXISTS trg_prevent_entry_update ON transaction_entries;
DROP TRIGGER IF EXISTS trg_prevent_non_draft_delete ON transactions;
DROP TRIGGER IF EXISTS trg_prevent_final_mod ON transactions;

DROP FUNCTION IF EXISTS prevent_entry_update();
DROP FUNCTION IF EXISTS prevent_non_draft_delete();
DROP FUNCTION IF EXISTS prevent_final_modification();

DROP TABLE IF EXISTS crypto_transaction_details;
DROP TABLE IF EXISTS transaction_entries;
DROP TABLE IF EXISTS transactions;
DROP TABLE IF EXISTS accounts;
DROP TABLE IF EXISTS counterparties;
DROP TABLE IF EXISTS categories;
DROP TABLE IF EXISTS projects;

DROP TYPE IF EXISTS rate_origin;
DROP TYPE IF EXISTS entry_direction;
DROP TYPE IF EXISTS transaction_status;
DROP TYPE IF EXISTS transaction_type;
DROP TYPE IF EXISTS account_kind;
";
