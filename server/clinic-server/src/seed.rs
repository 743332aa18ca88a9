//! Sample data for a fresh installation
//!
//! Safe to run repeatedly: users and patients are keyed by login and cédula,
//! and the sample history, prescription and notes are only created when the
//! corresponding table has nothing for them yet.

use crate::auth::hash_password;
use crate::server::ClinicServer;
use anyhow::{Context, Result};
use logger_redacted::redacted_info;
use sqlx::{Postgres, Transaction};

struct SeedUsuario {
    usuario: &'static str,
    password: &'static str,
    nombre: &'static str,
}

struct SeedCliente {
    nombre: &'static str,
    cedula: &'static str,
    telefono: &'static str,
    direccion: &'static str,
}

const USUARIOS: [SeedUsuario; 2] = [
    SeedUsuario {
        usuario: "admin",
        password: "admin123",
        nombre: "Administrador",
    },
    SeedUsuario {
        usuario: "jorge",
        password: "jorge123",
        nombre: "Jorge",
    },
];

const CLIENTES: [SeedCliente; 2] = [
    SeedCliente {
        nombre: "Juan Pérez García",
        cedula: "12345678",
        telefono: "3001234567",
        direccion: "Calle 50 # 45-30, Medellín",
    },
    SeedCliente {
        nombre: "María López Rodríguez",
        cedula: "87654321",
        telefono: "3109876543",
        direccion: "Carrera 70 # 32-15, Medellín",
    },
];

const FORMULA_ITEMS: [(&str, i32); 2] = [("Acetaminofén 500mg", 20), ("Ibuprofeno 400mg", 10)];

const NOTAS: [(&str, &str); 2] = [
    ("Llamar a Juan Pérez para recordar cita de control", "10:00"),
    ("Revisar resultados de laboratorio de María López", "14:30"),
];

/// Rows created by a seed run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub usuarios: u64,
    pub clientes: u64,
    pub historias: u64,
    pub formulas: u64,
    pub notas: u64,
}

/// Insert the sample users, patients and records that are missing
pub async fn run(server: &ClinicServer) -> Result<SeedSummary> {
    let mut summary = SeedSummary::default();
    let mut tx = server
        .database
        .begin()
        .await
        .context("Failed to start seed transaction")?;

    for usuario in &USUARIOS {
        let hash = hash_password(usuario.password, server.config.bcrypt_cost).await?;
        let created = sqlx::query(
            r#"
            INSERT INTO usuario (usuario, password, nombre)
            VALUES ($1, $2, $3)
            ON CONFLICT (usuario) DO NOTHING
            "#,
        )
        .bind(usuario.usuario)
        .bind(&hash)
        .bind(usuario.nombre)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        summary.usuarios += created;
        if created > 0 {
            redacted_info!("Usuario {} creado", usuario.usuario);
        }
    }

    let mut cliente_ids = Vec::with_capacity(CLIENTES.len());
    for cliente in &CLIENTES {
        let (id, created) = upsert_cliente(&mut tx, cliente).await?;
        summary.clientes += u64::from(created);
        cliente_ids.push(id);
    }

    if let Some(&cliente_id) = cliente_ids.first() {
        summary.historias = seed_historia(&mut tx, cliente_id).await?;
        summary.formulas = seed_formula(&mut tx, cliente_id).await?;
    }
    summary.notas = seed_notas(&mut tx).await?;

    tx.commit().await.context("Failed to commit seed data")?;

    tracing::info!(
        usuarios = summary.usuarios,
        clientes = summary.clientes,
        historias = summary.historias,
        formulas = summary.formulas,
        notas = summary.notas,
        "Seed completed"
    );
    Ok(summary)
}

async fn upsert_cliente(
    tx: &mut Transaction<'_, Postgres>,
    cliente: &SeedCliente,
) -> Result<(i32, bool)> {
    let inserted: Option<(i32,)> = sqlx::query_as(
        r#"
        INSERT INTO cliente (nombre, cedula, telefono, direccion)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (cedula) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(cliente.nombre)
    .bind(cliente.cedula)
    .bind(cliente.telefono)
    .bind(cliente.direccion)
    .fetch_optional(&mut **tx)
    .await?;

    if let Some((id,)) = inserted {
        redacted_info!("Cliente {} ({}) creado", cliente.nombre, cliente.cedula);
        return Ok((id, true));
    }

    let (id,): (i32,) = sqlx::query_as("SELECT id FROM cliente WHERE cedula = $1")
        .bind(cliente.cedula)
        .fetch_one(&mut **tx)
        .await?;
    Ok((id, false))
}

async fn seed_historia(tx: &mut Transaction<'_, Postgres>, cliente_id: i32) -> Result<u64> {
    let (existing,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM historia WHERE cliente_id = $1")
        .bind(cliente_id)
        .fetch_one(&mut **tx)
        .await?;
    if existing > 0 {
        return Ok(0);
    }

    sqlx::query(
        r#"
        INSERT INTO historia (cliente_id, observaciones, valor)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(cliente_id)
    .bind(
        "Paciente acude a consulta por dolor de cabeza recurrente. \
         Se recomienda tomar abundante agua y descanso.",
    )
    .bind(50000.0_f64)
    .execute(&mut **tx)
    .await?;
    Ok(1)
}

async fn seed_formula(tx: &mut Transaction<'_, Postgres>, cliente_id: i32) -> Result<u64> {
    let (existing,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM formula WHERE cliente_id = $1")
        .bind(cliente_id)
        .fetch_one(&mut **tx)
        .await?;
    if existing > 0 {
        return Ok(0);
    }

    let (formula_id,): (i32,) =
        sqlx::query_as("INSERT INTO formula (cliente_id) VALUES ($1) RETURNING id")
            .bind(cliente_id)
            .fetch_one(&mut **tx)
            .await?;

    for (nombre, cantidad) in FORMULA_ITEMS {
        sqlx::query("INSERT INTO formula_item (formula_id, nombre, cantidad) VALUES ($1, $2, $3)")
            .bind(formula_id)
            .bind(nombre)
            .bind(cantidad)
            .execute(&mut **tx)
            .await?;
    }
    Ok(1)
}

async fn seed_notas(tx: &mut Transaction<'_, Postgres>) -> Result<u64> {
    let (existing,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM nota")
        .fetch_one(&mut **tx)
        .await?;
    if existing > 0 {
        return Ok(0);
    }

    for (contenido, hora) in NOTAS {
        sqlx::query("INSERT INTO nota (contenido, hora) VALUES ($1, $2)")
            .bind(contenido)
            .bind(hora)
            .execute(&mut **tx)
            .await?;
    }
    Ok(NOTAS.len() as u64)
}
