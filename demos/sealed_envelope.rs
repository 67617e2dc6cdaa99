use unity_ledger::{init_logging, FieldParams, LogFormat, Ntru, Timestamp, Value};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging("info", LogFormat::Pretty)?;
    let scheme = Ntru::new(FieldParams::default());
    let keys = scheme.generate_keys(None)?;

    let payload = Value::record([
        ("memo", Value::from("quarterly settlement")),
        ("amount", Value::from(1_250u64)),
        ("tags", Value::set([Value::from("ops"), Value::from("audit")])),
        ("sent", Value::from(Timestamp::from_millis(1_700_000_000_000)?)),
    ]);
    let sealed = scheme.seal(&payload, &keys.public, None);
    println!("Envelope: {sealed}");
    let opened = scheme.open(&sealed, &keys.private)?;
    assert_eq!(opened, payload);
    println!("Opened with the private scalar.");

    let password = Value::from("correct horse battery staple");
    let locked = scheme.seal_with_password(&payload, &password, None)?;
    let unlocked = scheme.open_with_password(&locked, &password)?;
    assert_eq!(unlocked, payload);
    println!("Opened with the password.");

    match scheme.open_with_password(&locked, &Value::from("wrong")) {
        Ok(value) if value == payload => {
            eprintln!("Wrong password opened the envelope.");
            std::process::exit(1);
        }
        _ => println!("Wrong password rejected."),
    }
    Ok(())
}
