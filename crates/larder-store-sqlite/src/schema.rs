//! SQL schema for the Larder SQLite store.
//!
//! Executed once at connection startup. Every tenant-owned table carries a
//! `tenant_id` column, and every statement the session issues filters on it.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS tenants (
    tenant_id      TEXT PRIMARY KEY,
    name           TEXT NOT NULL,
    status         TEXT NOT NULL,    -- 'active' | 'inactive' | 'suspended'
    max_locations  INTEGER,
    max_products   INTEGER,
    created_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS locations (
    tenant_id    TEXT NOT NULL REFERENCES tenants(tenant_id),
    location_id  INTEGER NOT NULL,
    name         TEXT NOT NULL,
    created_at   TEXT NOT NULL,
    PRIMARY KEY (tenant_id, location_id)
);

CREATE TABLE IF NOT EXISTS products (
    tenant_id    TEXT NOT NULL REFERENCES tenants(tenant_id),
    product_id   INTEGER NOT NULL,
    name         TEXT NOT NULL,
    unit         TEXT NOT NULL,
    perishable   INTEGER NOT NULL,
    created_at   TEXT NOT NULL,
    PRIMARY KEY (tenant_id, product_id)
);

-- Lots are never deleted; exhaustion and blocking are status changes.
CREATE TABLE IF NOT EXISTS lots (
    lot_seq      INTEGER PRIMARY KEY AUTOINCREMENT,   -- creation order
    lot_id       TEXT NOT NULL UNIQUE,
    tenant_id    TEXT NOT NULL,
    location_id  INTEGER NOT NULL,
    product_id   INTEGER NOT NULL,
    batch_label  TEXT NOT NULL,
    initial      INTEGER NOT NULL,
    remaining    INTEGER NOT NULL,
    expires_on   TEXT,             -- YYYY-MM-DD; NULL for non-perishables
    status       TEXT NOT NULL,    -- 'active' | 'exhausted' | 'expired' | 'blocked'
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL,
    FOREIGN KEY (tenant_id, location_id) REFERENCES locations(tenant_id, location_id),
    FOREIGN KEY (tenant_id, product_id)  REFERENCES products(tenant_id, product_id),
    CHECK (remaining >= 0 AND remaining <= initial)
);

-- Materialised from lots inside the transaction that changes them.
CREATE TABLE IF NOT EXISTS stock (
    tenant_id    TEXT NOT NULL,
    location_id  INTEGER NOT NULL,
    product_id   INTEGER NOT NULL,
    quantity     INTEGER NOT NULL CHECK (quantity >= 0),
    minimum      INTEGER NOT NULL DEFAULT 0,
    maximum      INTEGER,
    band         TEXT NOT NULL,    -- 'out' | 'low' | 'normal' | 'high'
    updated_at   TEXT NOT NULL,
    PRIMARY KEY (tenant_id, location_id, product_id),
    FOREIGN KEY (tenant_id, location_id) REFERENCES locations(tenant_id, location_id),
    FOREIGN KEY (tenant_id, product_id)  REFERENCES products(tenant_id, product_id)
);

-- Strictly append-only; the triggers below reject UPDATE and DELETE.
CREATE TABLE IF NOT EXISTS movements (
    movement_seq     INTEGER PRIMARY KEY AUTOINCREMENT,
    movement_id      TEXT NOT NULL UNIQUE,
    tenant_id        TEXT NOT NULL,
    location_id      INTEGER NOT NULL,
    product_id       INTEGER NOT NULL,
    kind             TEXT NOT NULL,    -- 'entrada' | 'saida' | 'ajuste' | 'transferencia'
    lot_id           TEXT NOT NULL REFERENCES lots(lot_id),
    quantity_before  INTEGER NOT NULL,
    delta            INTEGER NOT NULL,
    quantity_after   INTEGER NOT NULL,
    reason           TEXT,
    document         TEXT,
    actor            TEXT,
    recorded_at      TEXT NOT NULL,    -- RFC 3339 UTC, fixed width
    CHECK (quantity_before + delta = quantity_after)
);

CREATE TRIGGER IF NOT EXISTS movements_no_update
BEFORE UPDATE ON movements
BEGIN
    SELECT RAISE(ABORT, 'movements are append-only');
END;

CREATE TRIGGER IF NOT EXISTS movements_no_delete
BEFORE DELETE ON movements
BEGIN
    SELECT RAISE(ABORT, 'movements are append-only');
END;

CREATE TRIGGER IF NOT EXISTS lots_no_delete
BEFORE DELETE ON lots
BEGIN
    SELECT RAISE(ABORT, 'lots are never deleted');
END;

CREATE INDEX IF NOT EXISTS lots_pair_idx      ON lots(tenant_id, location_id, product_id, status);
CREATE INDEX IF NOT EXISTS movements_pair_idx ON movements(tenant_id, location_id, product_id, movement_seq);

PRAGMA user_version = 1;
";
