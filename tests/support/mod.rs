#![allow(dead_code)]

pub mod architecture;

use devcluster::domain::{Cluster, Product};
use devcluster::port::outbound::Invocation;
use devcluster::testkit::fixture::Harness;

pub const REGISTRY_IMAGE: &str = "registry:2";

pub fn kind() -> Cluster {
    Cluster::new(Product::Kind)
}

/// Creates and deletes the harness has issued to `program`.
pub fn lifecycle_calls(harness: &Harness, program: &str) -> Vec<String> {
    harness
        .world
        .invocations()
        .into_iter()
        .filter(|i| i.program == program)
        .filter_map(|i| lifecycle_verb(&i))
        .collect()
}

fn lifecycle_verb(invocation: &Invocation) -> Option<String> {
    let args: Vec<&str> = invocation.args.iter().map(String::as_str).collect();
    match args.as_slice() {
        ["create", "cluster", ..] | ["cluster", "create", ..] | ["start", ..] => Some("create".into()),
        ["delete", "cluster", ..] | ["cluster", "delete", ..] | ["delete", ..] => Some("delete".into()),
        _ => None,
    }
}

pub fn stdin_of(invocation: &Invocation) -> &str {
    invocation.stdin_text().unwrap_or_default()
}
