mod automod_seeder;
mod core;

pub type Command = poise::Command<crate::Data, crate::Error>;

/// This structure defines a basic module
pub struct Module {
    /// The ID of the module
    pub id: &'static str,

    /// The name of the module
    pub name: &'static str,

    /// The description of the module
    pub description: &'static str,

    /// The commands in the module
    pub commands: Vec<Command>,
}

/// List of enabled modules
///
/// Add to this list to create a module
pub fn enabled_modules() -> Vec<Module> {
    vec![core::module(), automod_seeder::module()]
}
