/// Display version information
pub fn execute() {
    println!("agora {}", env!("CARGO_PKG_VERSION"));
    println!("Governance engine: voting ledger, timelock and treasury");
}
