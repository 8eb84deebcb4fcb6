//! List commands implementation

use crate::links;

/// List all compiled-in links
pub fn list_links() {
    print!("{}", links::link_help());
    println!();
    println!("Link strings take the form name[:key=value,...], e.g.");
    println!("  linux_spi:dev=/dev/spidev1.0,gpiochip=0,cs=25");
}
