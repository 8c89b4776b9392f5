use serde::Serialize;
use subasta_core::error::SubastaError;

pub fn print<T: Serialize + ?Sized>(value: &T) -> Result<(), SubastaError> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}
