//! Tarefas de fundo.
//!
//! Cada submódulo expõe um `run` de longa duração para `tokio::spawn`,
//! encerrado por um [`tokio_util::sync::CancellationToken`].

pub mod deletion_queue;
pub mod deletion_sweep;
