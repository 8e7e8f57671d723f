// Copyright 2024 Saorsa Labs
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Basic usage example for shard dispersal.

use std::sync::Arc;

use shard_dispersal::remote::InMemoryRemote;
use shard_dispersal::{open_engine, Config, FixedAnswer, RegisteredRemote, Remote, Strategy};
use tempfile::tempdir;

fn registered(name: &str, capacity: u64) -> RegisteredRemote {
    RegisteredRemote {
        remote: Remote {
            name: name.to_string(),
            kind: "memory".into(),
        },
        adapter: Arc::new(InMemoryRemote::new(name, capacity)),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let workdir = tempdir()?;
    let config = Config::default()
        .with_catalogue_dir(workdir.path().join("catalogue"))
        .with_shard_store_dir(workdir.path().join("shard"));

    let remotes = vec![
        registered("alpha", 10 * 1024 * 1024),
        registered("bravo", 10 * 1024 * 1024),
        registered("charlie", 10 * 1024 * 1024),
    ];
    let engine = open_engine(config, remotes)?;

    let source_dir = tempdir()?;
    let source_path = source_dir.path().join("report.txt");
    tokio::fs::write(&source_path, b"Quarterly figures, for authorized eyes only.").await?;

    let passphrase = "correct horse battery staple";
    engine
        .upload(&source_path, Strategy::RoundRobin, passphrase, &FixedAnswer(true), false)
        .await?;

    let record = engine.catalogue().get("report.txt").unwrap();
    println!(
        "dispersed {} data shards + {} parity shards across {} remotes",
        record.k,
        record.parity,
        record.shards.iter().map(|s| s.remote.as_ref().unwrap().name.clone()).collect::<std::collections::HashSet<_>>().len(),
    );

    let dest_dir = tempdir()?;
    let out_path = engine.download("report.txt", dest_dir.path(), passphrase, false).await?;
    let recovered = tokio::fs::read(&out_path).await?;
    println!("recovered {} bytes, matches original: {}", recovered.len(), recovered == b"Quarterly figures, for authorized eyes only.");

    engine.remove("report.txt", false).await?;
    println!("removed from every remote, catalogue entry dropped");

    Ok(())
}
