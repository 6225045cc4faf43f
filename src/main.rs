fn main() {
    if let Err(e) = rsvpd::run() {
        eprintln!("rsvpd: fatal: {e}");
        std::process::exit(1);
    }
}