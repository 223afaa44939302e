pub type Endpoint = str;

pub const OAUTH_TOKEN: &Endpoint = "/auth/oauth/token";
pub const HOME_STATION: &Endpoint = "/device/owner/station/home";
pub const ENERGY_FLOW: &Endpoint = "/device/sigen/station/energyflow/async";
pub const STATISTICS: &Endpoint = "/data-process/sigen/station/statistics/gains";
