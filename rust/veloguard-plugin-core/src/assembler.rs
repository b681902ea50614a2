use crate::config::{
    Address, AppConfig, Destination, InboundConfig, MuxSettings, OutboundConfig, RedirectTarget,
    ResolvedConfig, SenderSettings, StreamSettings,
};
use crate::options::{ResolvedOptions, Role};
use crate::socket::SocketTuning;
use crate::tls::TlsPolicy;
use crate::transport::ResolvedTransport;

/// Separator for multiple listen addresses on a server.
const LISTEN_ADDR_SEPARATOR: char = '|';

/// Builds the final configuration tree from already-resolved parts.
pub struct ConfigAssembler<'a> {
    opts: &'a ResolvedOptions,
    transport: ResolvedTransport,
    security: TlsPolicy,
    socket: Option<SocketTuning>,
}

impl<'a> ConfigAssembler<'a> {
    pub fn new(
        opts: &'a ResolvedOptions,
        transport: ResolvedTransport,
        security: TlsPolicy,
        socket: Option<SocketTuning>,
    ) -> Self {
        Self {
            opts,
            transport,
            security,
            socket,
        }
    }

    pub fn assemble(self) -> ResolvedConfig {
        let destination = Destination {
            address: Address::parse(&self.opts.remote_addr),
            port: self.opts.remote_port,
        };
        let mux_eligible = self.transport.mux_eligible;
        let opts = self.opts;
        let stream = StreamSettings {
            protocol: self.transport.kind().protocol_name(),
            transport: self.transport.settings,
            socket: self.socket,
            security: self.security,
        };

        let (inbounds, outbound) = match opts.role {
            Role::Server => {
                let redirect = if mux_eligible {
                    Address::mux_cool()
                } else {
                    Address::localhost()
                };
                let inbounds = opts
                    .local_addr
                    .split(LISTEN_ADDR_SEPARATOR)
                    .map(|addr| InboundConfig {
                        listen: Address::parse(addr),
                        port: opts.local_port,
                        stream: Some(stream.clone()),
                        redirect: RedirectTarget::tcp(redirect.clone()),
                    })
                    .collect();
                let outbound = OutboundConfig {
                    destination,
                    sender: None,
                };
                (inbounds, outbound)
            }
            Role::Client => {
                let inbound = InboundConfig {
                    listen: Address::parse(&opts.local_addr),
                    port: opts.local_port,
                    stream: None,
                    redirect: RedirectTarget::tcp(Address::localhost()),
                };
                let mux = mux_eligible.then_some(MuxSettings {
                    enabled: true,
                    concurrency: opts.mux,
                });
                let outbound = OutboundConfig {
                    destination,
                    sender: Some(SenderSettings { stream, mux }),
                };
                (vec![inbound], outbound)
            }
        };

        ResolvedConfig {
            role: opts.role,
            inbounds,
            outbound,
            apps: AppConfig::defaults(opts.log_level),
            protect_sockets: opts.vpn,
        }
    }
}
