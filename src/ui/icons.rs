pub struct Icons;

impl Icons {
    pub const CHECK: &str = "✅";
    pub const INFO: &str = "ℹ️";
    pub const KEY: &str = "🔑";
    pub const DATABASE: &str = "🗄️";
    pub const DEL: &str = "🗑️";
    pub const EMPTY: &str = "∅";
}
