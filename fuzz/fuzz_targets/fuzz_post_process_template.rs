#![no_main]

use libfuzzer_sys::fuzz_target;
use std::path::Path;
use stitchtoon_gui::worker::PostProcessCommand;

fuzz_target!(|data: (&str, &str)| {
    // Shell splitting and placeholder substitution on arbitrary input
    let (script, args) = data;
    if let Ok(command) =
        PostProcessCommand::from_template(script, args, Path::new("/in dir"), Path::new("/out"))
    {
        let _ = command.to_command();
    }
});
