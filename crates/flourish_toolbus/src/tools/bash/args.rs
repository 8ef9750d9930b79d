use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ExecuteBashArgs {
    #[serde(alias = "command")]
    pub cmd: String,
}
