// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::process;

fn build_cli() -> Command {
    Command::new("nexus-relay")
        .version(env!("CARGO_PKG_VERSION"))
        .author("nexus-relay Contributors")
        .about("Replicate artifact repositories between Nexus registries")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .default_value("/etc/nexus-relay/config.toml")
                .help("Configuration file"),
        )
        .subcommand(Command::new("server").about("Run the relay broker"))
        .subcommand(
            Command::new("client")
                .about("Sync the configured repositories through a broker")
                .arg(
                    Arg::new("once")
                        .long("once")
                        .action(ArgAction::SetTrue)
                        .help("Run every sync unit once and exit, even if daemon mode is enabled"),
                ),
        )
}

/// Short git revision, if the source tree is a checkout
fn git_revision() -> Option<String> {
    let output = process::Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let revision = String::from_utf8(output.stdout).ok()?;
    let revision = revision.trim();
    (!revision.is_empty()).then(|| revision.to_string())
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=NEXUS_RELAY_BUILD");

    let build = env::var("NEXUS_RELAY_BUILD")
        .ok()
        .or_else(git_revision)
        .unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env=NEXUS_RELAY_BUILD={}", build);

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("nexus-relay.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
