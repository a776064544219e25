use std::fs::File;
use std::io::Error;
use std::path::Path;

/// Writes a journal giving each user a 10-credit top-up followed by one
/// plain 4x upscale, leaving every balance at 8.
pub fn generate_journal(path: &Path, users: u64) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);

    wtr.write_record([
        "op", "user", "tier", "enhance", "session", "product", "amount", "paid", "outcome",
    ])?;

    for user in 1..=users {
        wtr.write_record([
            "topup",
            &user.to_string(),
            "",
            "",
            &format!("cs_{user}"),
            "prod_010",
            "10",
            "true",
            "",
        ])?;
        wtr.write_record([
            "upscale",
            &user.to_string(),
            "4",
            "false",
            "",
            "",
            "",
            "",
            "ok",
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
