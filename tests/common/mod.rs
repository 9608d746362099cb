use std::fs::File;
use std::io::{Error, Write};
use std::path::Path;
use tempfile::NamedTempFile;

pub const HEADER: &str = "type, account, payee, id, value, frequency";

/// Writes `rows` under the script header into a temporary file.
pub fn script(rows: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{HEADER}").unwrap();
    for row in rows {
        writeln!(file, "{row}").unwrap();
    }
    file.flush().unwrap();
    file
}

/// Generates a script with `subscribers` subscriptions charged over `cycles` cycles.
pub fn generate_subscription_script(
    path: &Path,
    subscribers: usize,
    cycles: usize,
) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(file);
    wtr.write_record(["type", "account", "payee", "id", "value", "frequency"])?;

    for i in 0..subscribers {
        let payer = format!("payer_{i}");
        wtr.write_record(["fund", &payer, "", "", "1000000", ""])?;
        wtr.write_record(["subscribe", &payer, "merchant", "", "100", "10"])?;
    }
    for _ in 0..cycles {
        wtr.write_record(["advance", "", "", "", "10", ""])?;
        for id in 0..subscribers {
            wtr.write_record(["charge", "", "", &id.to_string(), "", ""])?;
        }
    }

    wtr.flush()?;
    Ok(())
}
