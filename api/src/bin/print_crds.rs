use std::io::stdout;

use k8s_openapi::List;
use populator::all_crds;

fn main() -> serde_json::Result<()> {
    serde_json::to_writer_pretty(
        stdout(),
        &List {
            items: all_crds(),
            ..Default::default()
        },
    )
}
