use solarstats::prelude::*;

fn main() -> Result<()> {
    solarstats::app(Options::new())
}
