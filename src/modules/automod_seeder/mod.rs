mod cmds;
mod core;
mod settings;

pub fn module() -> crate::modules::Module {
    crate::modules::Module {
        id: "automod_seeder",
        name: "AutoMod Seeder",
        description: "Seeds a guild with random AutoMod rules for badge testing.",
        commands: vec![cmds::automodseed()],
    }
}
