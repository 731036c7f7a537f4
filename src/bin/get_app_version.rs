use apkres::Apk;
use std::env;
use std::error::Error;
use std::process;

// Prints [versionCode, versionName] from an APK's manifest.
//
// Usage: get_app_version <APKFile>
fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <APKFile>", args[0]);
        process::exit(1);
    }

    if let Err(e) = run(&args[1]) {
        eprintln!("Aborted due to error: {e}");
        process::exit(1);
    }
}

fn run(apk_path: &str) -> Result<(), Box<dyn Error>> {
    let apk = Apk::open(apk_path)?;
    let manifest = apk.parse_xml("AndroidManifest.xml", false, true)?;
    let root = manifest
        .root()
        .ok_or("AndroidManifest.xml has no root element")?;
    let version_code = root.attribute("android:versionCode").unwrap_or("");
    let version_name = root.attribute("android:versionName").unwrap_or("");
    println!("[{version_code}, {version_name}]");
    Ok(())
}
