use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use wecklern_core::event::DismissalEvent;
use wecklern_core::{MelodyDescriptor, StateKey};

fn main() -> Result<(), Box<dyn Error>> {
    let path = std::env::args().nth(1);
    let reader: Box<dyn BufRead> = match path {
        Some(p) => Box::new(BufReader::new(File::open(p)?)),
        None => Box::new(BufReader::new(io::stdin())),
    };

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let event: DismissalEvent = serde_json::from_str(&line)?;
        let outcome = event.to_outcome(MelodyDescriptor::default_primer)?;
        let key = StateKey::from_outcome(&outcome);

        println!("{key}\t{}", outcome.melody_used);
    }

    Ok(())
}
