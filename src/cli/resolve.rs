use crate::resolver;

use super::{ConfigArgs, SignalArgs, load_context, print_json};

pub fn run_resolve(signals: SignalArgs, config: ConfigArgs) -> anyhow::Result<()> {
    let (_, signals) = load_context(&config, &signals)?;
    let resolution = resolver::explain(&signals);

    if config.json {
        return print_json(&resolution);
    }

    println!("{}", resolution.namespace);
    Ok(())
}
