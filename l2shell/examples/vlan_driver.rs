//! A minimal Dell Force10 VLAN driver behind the result cache.
//!
//! Implements a few [`L2Api`] operations over a shared session, then
//! creates a VLAN and lists VLANs twice: the second listing comes from the
//! cache, and the creation clears it beforehand.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example vlan_driver -- 10.0.0.1 admin secret 100
//! ```

use std::env;

use l2shell::error::{ConfigError, DriverError};
use l2shell::{
    CachedL2Api, CommandExecutor, InteractionScript, L2Api, Records, Result, SessionBuilder,
    SharedSession,
};
use serde_json::json;

struct Force10<E> {
    shell: E,
}

impl<E: CommandExecutor> L2Api for Force10<E> {
    async fn show_hostname(&mut self) -> Result<String> {
        let transcript = self
            .shell
            .send_command("show running-config | grep hostname")
            .await?;
        transcript
            .lines()
            .find_map(|line| line.trim().strip_prefix("hostname "))
            .map(str::to_string)
            .ok_or_else(|| {
                DriverError::Parse {
                    command: transcript.command().to_string(),
                    message: "no hostname line".to_string(),
                }
                .into()
            })
    }

    async fn show_vlans(&mut self, vlan_id: Option<u16>) -> Result<Records> {
        let command = match vlan_id {
            Some(id) => format!("show vlan id {id}"),
            None => "show vlan brief".to_string(),
        };
        let transcript = self.shell.send_command(&command).await?;

        let mut vlans = Records::new();
        for line in transcript.lines() {
            let mut fields = line.split_whitespace();
            if let Some(id) = fields.next().filter(|id| id.parse::<u16>().is_ok()) {
                let name = fields.next().unwrap_or_default();
                vlans.insert(id.to_string(), json!({ "name": name }));
            }
        }
        match vlan_id {
            Some(id) if vlans.is_empty() => Err(DriverError::NotFound {
                kind: "VLAN",
                id: id.to_string(),
            }
            .into()),
            _ => Ok(vlans),
        }
    }

    async fn create_vlan(&mut self, vlan_id: u16, description: Option<&str>) -> Result<()> {
        let interface = format!("interface vlan {vlan_id}");
        let describe = match description {
            Some(text) => format!("description {text}"),
            None => "no description".to_string(),
        };
        let script = InteractionScript::from_pairs([
            (r"\(conf\)#", interface.as_str()),
            (r"\(conf-if-vl-\d+\)#", describe.as_str()),
            (r"\(conf-if-vl-\d+\)#", "end"),
        ])
        .map_err(ConfigError::from)?;
        self.shell.execute("configure", &script).await?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 5 {
        eprintln!("usage: vlan_driver <host> <user> <password> <vlan id>");
        std::process::exit(1);
    }
    let vlan_id: u16 = args[4].parse()?;

    let shell: SharedSession = SessionBuilder::new(&args[1])
        .username(&args[2])
        .password(&args[3])
        .dialect("dell_force10")
        .build_shared()?;
    let mut api = CachedL2Api::new(Force10 {
        shell: shell.clone(),
    });

    println!("Hostname: {}", api.show_hostname(None).await?);

    let before = api.show_vlans(None, None).await?;
    println!("{} VLANs configured", before.len());

    api.create_vlan(vlan_id, Some("created-by-l2shell")).await?;

    // Cleared by create_vlan, so this asks the switch again
    let after = api.show_vlans(None, None).await?;
    println!("{} VLANs configured", after.len());

    // Served from the listing above
    let one = api.show_vlans(Some(vlan_id), None).await?;
    println!("VLAN {}: {}", vlan_id, serde_json::to_string_pretty(&one)?);

    shell.close().await;
    Ok(())
}
