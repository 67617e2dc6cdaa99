use std::env;
use std::path::Path;
use std::sync::Arc;
use unity_ledger::{
    init_logging, EventBus, LedgerConfig, LedgerEvent, LocalEventBus, LogFormat, TransferConfig,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Optional: path to a JSON ledger configuration.
    let config = match env::args().nth(1) {
        Some(path) => LedgerConfig::load(Path::new(&path))?,
        None => LedgerConfig::default(),
    };
    let format = LogFormat::from_str_lossy(&env::var("LOG_FORMAT").unwrap_or_default());
    init_logging(&config.log_level, format)?;

    let bus = Arc::new(LocalEventBus::new());
    for name in [
        unity_ledger::events::TOKEN_MINTED,
        unity_ledger::events::TRANSACTION_APPENDED,
        unity_ledger::events::TRANSACTION_REJECTED,
    ] {
        bus.subscribe(
            name,
            Arc::new(move |event: &LedgerEvent| println!("[{name}] {event:?}")),
        );
    }
    let ledger = config.build_ledger()?.with_events(bus);

    let alice = ledger.ntru().generate_keys(None)?;
    let bob = ledger.ntru().generate_keys(None)?;
    let carol = ledger.ntru().generate_keys(None)?;

    let mut token = ledger.mint_token(&alice.public, 1 << 10)?;
    if !ledger.verify_token(&token) {
        eprintln!("Token proof failed to verify.");
        std::process::exit(1);
    }
    println!(
        "Minted token {:x} worth {} ({} proof rounds).",
        ledger.token_id(&token),
        token.value,
        token.proof.proof.len()
    );

    let tx = ledger.create_transaction(
        &token,
        None,
        &alice.private,
        TransferConfig::spend(alice.public.clone(), bob.public.clone(), 600),
    )?;
    let first = ledger.append_transaction(&mut token, tx)?;

    let tx = ledger.create_transaction(
        &token,
        Some(&first),
        &bob.private,
        TransferConfig::spend(bob.public.clone(), carol.public.clone(), 250),
    )?;
    let second = ledger.append_transaction(&mut token, tx)?;

    // Bob cannot overspend.
    let overspend = ledger.create_transaction(
        &token,
        Some(&second),
        &bob.private,
        TransferConfig::spend(bob.public.clone(), carol.public.clone(), 500),
    )?;
    if let Err(err) = ledger.append_transaction(&mut token, overspend) {
        println!("Rejected: {err}");
    }

    for (label, key) in [("alice", &alice), ("bob", &bob), ("carol", &carol)] {
        println!(
            "{label:>5}: spendable {}",
            ledger.spendable_value(&token, &key.public)
        );
    }
    println!("Depth of latest transaction: {}", ledger.chain_depth(&token, &second));
    println!("Current owners: {}", ledger.current_owners(&token).len());
    Ok(())
}
