use apkres::Apk;
use std::env;
use std::error::Error;
use std::fs;
use std::process;

// Writes an APK's manifest as pretty, reference-resolved XML text.
//
// Usage: read_manifest <APKFile> <OutFile>
fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        eprintln!("Usage: {} <APKFile> <OutFile>", args[0]);
        process::exit(1);
    }

    if let Err(e) = run(&args[1], &args[2]) {
        eprintln!("Aborted due to error: {e}");
        process::exit(1);
    }
}

fn run(apk_path: &str, out_path: &str) -> Result<(), Box<dyn Error>> {
    let apk = Apk::open(apk_path)?;
    let manifest = apk.parse_xml("AndroidManifest.xml", true, true)?;
    fs::write(out_path, manifest.text)?;
    Ok(())
}
