// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! CRD YAML Generator
//!
//! Writes the `Queue` CustomResourceDefinition generated from src/crd.rs, so the manifest
//! under deploy/crds/ never drifts from the Rust types.
//!
//! Usage:
//!   cargo run --bin crdgen [OUTPUT_DIR]
//!
//! `OUTPUT_DIR` defaults to deploy/crds.

use kube::CustomResourceExt;
use sqs_queue_operator::constants::QUEUE_PLURAL;
use sqs_queue_operator::crd::Queue;
use std::fs;
use std::path::PathBuf;

const GENERATED_HEADER: &str = "# Copyright (c) 2025 Erick Bourgeois, firestoned
# SPDX-License-Identifier: MIT
#
# Generated from src/crd.rs by `cargo run --bin crdgen`. Do not edit.
#
";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let output_dir = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from("deploy/crds"), PathBuf::from);
    fs::create_dir_all(&output_dir)?;

    let yaml = serde_yaml::to_string(&Queue::crd())?;
    let output_path = output_dir.join(format!("{QUEUE_PLURAL}.crd.yaml"));
    fs::write(&output_path, format!("{GENERATED_HEADER}{yaml}"))?;

    println!("✓ Wrote {}", output_path.display());
    println!("  Install with: kubectl apply -f {}", output_path.display());

    Ok(())
}
