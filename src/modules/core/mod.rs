mod help;
mod ping;
mod stats;

pub fn module() -> crate::modules::Module {
    crate::modules::Module {
        id: "core",
        name: "Core Commands",
        description: "Ping, stats and help.",
        commands: vec![help::help(), ping::ping(), stats::stats()],
    }
}
