const BUILD: &str = match option_env!("SWARM_BUILD") {
    Some(build) => build,
    None => "dev",
};

const COMMIT: &str = match option_env!("SWARM_COMMIT") {
    Some(commit) => commit,
    None => "HEAD",
};

/// `version-build@commit`, with build and commit stamped in at compile
/// time from `SWARM_BUILD` and `SWARM_COMMIT`.
pub fn full_version() -> String {
    format!("{}-{BUILD}@{COMMIT}", env!("CARGO_PKG_VERSION"))
}

pub fn version() -> anyhow::Result<()> {
    println!("{}", full_version());
    Ok(())
}
