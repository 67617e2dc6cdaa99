use std::env;
use std::time::Instant;
use unity_ledger::{init_logging, FieldParams, LogFormat, Value, Vdf};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging("info", LogFormat::Pretty)?;
    let steps: u64 = match env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => 1 << 16,
    };
    let vdf = Vdf::new(FieldParams::default().p().clone())?;
    let msg = Value::from("vdf_rounds demo");

    let start = Instant::now();
    let out = vdf.prove(&msg, steps)?;
    let proved = start.elapsed();

    let start = Instant::now();
    let ok = vdf.verify(&msg, steps, &out.y, &out.proof);
    let verified = start.elapsed();

    println!("T = {steps}: {} rounds", out.proof.len());
    for (i, round) in out.proof.iter().enumerate().take(4) {
        println!("  round {i}: r = {:x}", round.r);
    }
    println!("prove {proved:?}, verify {verified:?}, valid = {ok}");
    if !ok {
        std::process::exit(1);
    }
    Ok(())
}
