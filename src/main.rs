/*!
An OpenFlow 1.0 proxy between datapaths and a virtual routing plane.

Switches connect to the proxy as their controller. The proxy reports their
ports to the route control service via a message bus, installs the flows
the service requests and redirects frames between physical ports and the
virtual switch ports mirroring them.

You can use mininet as a test switch.
To spawn an instance with 4 ports you can run:

```sh
# mn --controller remote,port=6633 --topo single,4 --switch ovs,protocols=OpenFlow10
```
*/

#[macro_use]
extern crate clap;
#[macro_use]
extern crate log;
extern crate byteorder;
extern crate ini;
extern crate ipnetwork;
extern crate rand;
extern crate simple_logger;

#[cfg(unix)]
extern crate libc;
#[cfg(unix)]
extern crate log_panics;
#[cfg(unix)]
extern crate syslog;

mod conf;
mod ipc;
mod openflow;
mod port_map;
mod proxy;
mod tlv;
mod types;

use ipc::client::BusClient;
use openflow::Datapaths;
use proxy::RfProxy;

use std::io;
use std::net;
use std::process::exit;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

#[cfg(unix)]
use std::fs::File;
#[cfg(unix)]
use std::io::prelude::*;

/// Forks and writes the child's PID to `pid_path`. The parent exits.
#[cfg(unix)]
fn daemonize(pid_path: &str) -> io::Result<()> {
    let pid = unsafe { libc::fork() };
    if pid < 0 {
        return Err(io::Error::last_os_error());
    }
    else if pid > 0 {
        // exit the parent process
        exit(0);
    }
    let mut file = File::create(pid_path)?;
    write!(file, "{}", std::process::id())
}

/// Reads command line arguments and calls the corresponding functions.
fn handle_cli_args() -> io::Result<()> {
    #[cfg(unix)]
    let unix_opts = "-p, --pid [file] 'Daemonizes the process and writes a PID file'
        -s, --syslog      'Logs via syslog'
        ";
    #[cfg(not(unix))]
    let unix_opts = "";

    let usage = &format!(
        "{}-v...          'Repeat to set the level of verbosity'
        -c, --conf [ini]  'The INI configuration file'",
        unix_opts
    );
    let matches = app_from_crate!().args_from_usage(usage).get_matches();

    let log_lvl = match matches.occurrences_of("v") {
        0 => log::Level::Error,
        1 => log::Level::Warn,
        2 => log::Level::Info,
        3 => log::Level::Debug,
        _ => log::Level::Trace,
    };

    #[cfg(unix)]
    {
        if matches.is_present("syslog") {
            let app_name = Some(crate_name!());
            syslog::init(syslog::Facility::LOG_USER, log_lvl.to_level_filter(), app_name)
                .expect("error on logging initialization");
            log_panics::init();
        }
        else {
            simple_logger::init_with_level(log_lvl).expect("error on logging initialization");
        }
    }
    #[cfg(not(unix))]
    simple_logger::init_with_level(log_lvl).expect("error on logging initialization");

    let conf = conf::parse_file(matches.value_of("conf"))?;

    #[cfg(unix)]
    {
        if let Some(pid_path) = matches.value_of("pid") {
            daemonize(pid_path)?;
        }
    }

    let listen_socket = net::TcpListener::bind(conf.connection.socket)?;
    info!("Listening on {}", listen_socket.local_addr()?);

    let (tx, rx) = mpsc::channel();

    let bus = Arc::new(BusClient::new(conf.bus.socket));
    let bus_reader = bus.clone();
    let bus_tx = tx.clone();
    thread::spawn(move || bus_reader.run(bus_tx));

    let datapaths = Datapaths::new();
    let of_datapaths = datapaths.clone();
    thread::spawn(move || openflow::listen(&listen_socket, &of_datapaths, &tx));

    let mut rfproxy = RfProxy::new(conf.proxy.id, conf.proxy.rfvs_prefix, bus, datapaths);
    rfproxy.run(&rx);
    Ok(())
}

/// Entry function with top level error handling.
fn main() {
    if let Err(e) = handle_cli_args() {
        error!("{}", e);
        exit(1);
    }
}
