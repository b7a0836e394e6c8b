mod spec;

use std::time::Duration;

use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    sync::mpsc::{Receiver, Sender, channel},
    sync::oneshot,
    task::JoinHandle,
    time::timeout,
};

use crate::{
    command::Command,
    error::{AppError, ErrorType},
    sigma::patch::ParamId,
    user_session::spec::{Spec, Value},
};

pub async fn start() -> std::io::Result<(Receiver<Command>, JoinHandle<()>)> {
    let (command_tx, command_rx) = channel(8);
    let listener = TcpListener::bind("127.0.0.1:9999").await?;
    let handle = tokio::spawn(async move {
        log::info!("Listening on port 9999");
        loop {
            // The second item contains the IP and port of the new connection.
            match listener.accept().await {
                Ok((stream, _)) => start_session(stream, command_tx.clone()),
                Err(e) => log::error!("User connection accept error: {:?}", e),
            }
        }
    });
    return Ok((command_rx, handle));
}

fn start_session(stream: TcpStream, command_tx: Sender<Command>) {
    tokio::spawn(async move {
        let mut session = Session::new(stream, command_tx);
        if let Err(e) = session.run().await {
            log::error!("Session error: {:?}", e);
        }
    });
}

struct Session {
    stream: BufReader<TcpStream>,
    command_tx: Sender<Command>,
}

impl Session {
    pub fn new(stream: TcpStream, command_tx: Sender<Command>) -> Self {
        Self {
            stream: BufReader::new(stream),
            command_tx,
        }
    }

    pub async fn run(&mut self) -> std::io::Result<()> {
        self.stream
            .write_all(b"\r\n==============================\r\n welcome to sigma control\r\n==============================\r\n\r\n")
            .await?;

        loop {
            self.stream.write_all(b"sigma> ").await?;
            let mut line = String::new();
            match self.stream.read_line(&mut line).await? {
                0 => {
                    log::debug!("Connection closed");
                    return Ok(());
                }
                _ => {
                    let trimmed = line.trim().to_string();
                    log::debug!("Received: {}", trimmed);
                    let tokens: Vec<String> = Self::tokenize(&trimmed);
                    if tokens.is_empty() {
                        // do nothing
                        continue;
                    }
                    let command = tokens[0].trim();
                    match command {
                        "hello" => {
                            self.stream.write_all(b"hi\r\n").await?;
                        }
                        "hi" => self.hi().await?,
                        "status" => self.status().await?,
                        "get-patch" => self.get_patch().await?,
                        "get-global" => self.get_global().await?,
                        "params" => self.params().await?,
                        "set" => self.set(command, &tokens).await?,
                        "set-name" => self.set_name(command, &tokens).await?,
                        "select-patch" => self.select_patch(command, &tokens).await?,
                        "request-global" => self.request_global().await?,
                        "request-patch" => self.request_patch(command, &tokens).await?,
                        "request-param" => self.request_param(command, &tokens).await?,
                        "request-pattern" => self.request_pattern().await?,
                        "request-sequencer" => self.request_sequencer().await?,
                        "request-name" => self.request_name().await?,
                        "quit" => {
                            self.stream.write_all(b"bye!\r\n").await?;
                            return Ok(());
                        }
                        "" => {
                            // do nothing
                        }
                        _ => {
                            self.stream
                                .write_all(format!("{}: Unknown command\r\n", command).as_bytes())
                                .await?;
                        }
                    }
                }
            }
        }
    }

    async fn hi(&mut self) -> std::io::Result<()> {
        let (resp_tx, resp_rx) = oneshot::channel();
        let command = Command::Hi { resp: resp_tx };
        self.send_command(command).await?;
        return self.wait_and_handle_response(resp_rx, |r| r).await;
    }

    async fn status(&mut self) -> std::io::Result<()> {
        let (resp_tx, resp_rx) = oneshot::channel();
        let command = Command::Status { resp: resp_tx };
        self.send_command(command).await?;
        return self
            .wait_and_handle_response(resp_rx, |snapshot| yaml_block(&snapshot))
            .await;
    }

    async fn get_patch(&mut self) -> std::io::Result<()> {
        let (resp_tx, resp_rx) = oneshot::channel();
        let command = Command::GetPatch { resp: resp_tx };
        self.send_command(command).await?;
        return self
            .wait_and_handle_response(resp_rx, |patch| yaml_block(&patch))
            .await;
    }

    async fn get_global(&mut self) -> std::io::Result<()> {
        let (resp_tx, resp_rx) = oneshot::channel();
        let command = Command::GetGlobal { resp: resp_tx };
        self.send_command(command).await?;
        return self
            .wait_and_handle_response(resp_rx, |global| match global {
                Some(record) => yaml_block(&record),
                None => "no global settings received yet".to_string(),
            })
            .await;
    }

    async fn params(&mut self) -> std::io::Result<()> {
        let mut lines = Vec::<String>::new();
        for param in ParamId::ALL {
            lines.push(format!("  {}", param.name()));
        }
        lines.push("".to_string());
        self.stream.write_all(lines.join("\r\n").as_bytes()).await?;
        return Ok(());
    }

    async fn set(&mut self, command: &str, tokens: &Vec<String>) -> std::io::Result<()> {
        let specs = vec![Spec::str("param", true), Spec::u8("value", true)];
        let Some(params) = self.parse_params(command, tokens, &specs).await? else {
            return Ok(());
        };

        let param_name = params[0].as_text().unwrap();
        let value = params[1].as_u8().unwrap();
        let Some(param) = ParamId::from_name(&param_name) else {
            self.stream
                .write_all(format!("No such parameter: {}\r\n", param_name).as_bytes())
                .await?;
            return Ok(());
        };

        let (resp_tx, resp_rx) = oneshot::channel();
        let command = Command::SetParam {
            param,
            value,
            resp: resp_tx,
        };
        self.send_command(command).await?;
        return self
            .wait_and_handle_response(resp_rx, |_| "ok".to_string())
            .await;
    }

    async fn set_name(&mut self, command: &str, tokens: &Vec<String>) -> std::io::Result<()> {
        let specs = vec![Spec::str("name", true)];
        let Some(params) = self.parse_params(command, tokens, &specs).await? else {
            return Ok(());
        };

        let (resp_tx, resp_rx) = oneshot::channel();
        let command = Command::SetName {
            name: params[0].as_text().unwrap(),
            resp: resp_tx,
        };
        self.send_command(command).await?;
        return self
            .wait_and_handle_response(resp_rx, |_| "ok".to_string())
            .await;
    }

    async fn select_patch(&mut self, command: &str, tokens: &Vec<String>) -> std::io::Result<()> {
        let specs = vec![
            Spec::u8("group", true),
            Spec::u8("bank", true),
            Spec::u8("patch", true),
        ];
        let Some(params) = self.parse_params(command, tokens, &specs).await? else {
            return Ok(());
        };

        let (resp_tx, resp_rx) = oneshot::channel();
        let command = Command::SelectPatch {
            group: params[0].as_u8().unwrap(),
            bank: params[1].as_u8().unwrap(),
            patch: params[2].as_u8().unwrap(),
            resp: resp_tx,
        };
        self.send_command(command).await?;
        return self
            .wait_and_handle_response(resp_rx, |_| "ok".to_string())
            .await;
    }

    async fn request_global(&mut self) -> std::io::Result<()> {
        let (resp_tx, resp_rx) = oneshot::channel();
        let command = Command::RequestGlobalDump { resp: resp_tx };
        self.send_command(command).await?;
        return self
            .wait_and_handle_response(resp_rx, |_| "sent".to_string())
            .await;
    }

    async fn request_patch(&mut self, command: &str, tokens: &Vec<String>) -> std::io::Result<()> {
        let specs = vec![Spec::u8("slot", false)];
        let Some(params) = self.parse_params(command, tokens, &specs).await? else {
            return Ok(());
        };
        let slot = params.first().and_then(|p| p.as_u8());

        let (resp_tx, resp_rx) = oneshot::channel();
        let command = Command::RequestPatchDump {
            slot,
            resp: resp_tx,
        };
        self.send_command(command).await?;
        return self
            .wait_and_handle_response(resp_rx, |_| "sent".to_string())
            .await;
    }

    async fn request_param(&mut self, command: &str, tokens: &Vec<String>) -> std::io::Result<()> {
        let specs = vec![Spec::str("param", true)];
        let Some(params) = self.parse_params(command, tokens, &specs).await? else {
            return Ok(());
        };

        let param_name = params[0].as_text().unwrap();
        let Some(param) = ParamId::from_name(&param_name) else {
            self.stream
                .write_all(format!("No such parameter: {}\r\n", param_name).as_bytes())
                .await?;
            return Ok(());
        };

        let (resp_tx, resp_rx) = oneshot::channel();
        let command = Command::RequestParamValue {
            param,
            resp: resp_tx,
        };
        self.send_command(command).await?;
        return self
            .wait_and_handle_response(resp_rx, |_| "sent".to_string())
            .await;
    }

    async fn request_pattern(&mut self) -> std::io::Result<()> {
        let (resp_tx, resp_rx) = oneshot::channel();
        let command = Command::RequestPatternDump { resp: resp_tx };
        self.send_command(command).await?;
        return self
            .wait_and_handle_response(resp_rx, |_| "sent".to_string())
            .await;
    }

    async fn request_sequencer(&mut self) -> std::io::Result<()> {
        let (resp_tx, resp_rx) = oneshot::channel();
        let command = Command::RequestSequencerDump { resp: resp_tx };
        self.send_command(command).await?;
        return self
            .wait_and_handle_response(resp_rx, |_| "sent".to_string())
            .await;
    }

    async fn request_name(&mut self) -> std::io::Result<()> {
        let (resp_tx, resp_rx) = oneshot::channel();
        let command = Command::RequestPatchName { resp: resp_tx };
        self.send_command(command).await?;
        return self
            .wait_and_handle_response(resp_rx, |_| "sent".to_string())
            .await;
    }

    // Utilities ////////////////////////////////////////////////////////////////

    async fn send_command(&mut self, command: Command) -> std::io::Result<()> {
        if self.command_tx.send(command).await.is_err() {
            self.stream
                .write_all(b"control center is not running\r\n")
                .await?;
        }
        return Ok(());
    }

    fn tokenize(input: &str) -> Vec<String> {
        let mut tokens = Vec::new();
        let mut current = String::new();
        let mut chars = input.chars().peekable();
        let mut in_quotes: Option<char> = None;

        while let Some(c) = chars.next() {
            match c {
                // entering or exiting quotes
                '\'' | '"' => {
                    if in_quotes == Some(c) {
                        // closing matching quote
                        in_quotes = None;
                    } else if in_quotes.is_none() {
                        // starting new quoted section
                        in_quotes = Some(c);
                    } else {
                        // different quote inside quotes -> treat as normal char
                        current.push(c);
                    }
                }

                // whitespace: token delimiter only when NOT in quotes
                c if c.is_whitespace() && in_quotes.is_none() => {
                    if !current.is_empty() {
                        tokens.push(current.clone());
                        current.clear();
                    }
                }

                // normal character
                _ => current.push(c),
            }
        }

        // push final token if exists
        if !current.is_empty() {
            tokens.push(current);
        }

        tokens
    }

    async fn parse_params(
        &mut self,
        command: &str,
        tokens: &Vec<String>,
        specs: &Vec<Spec>,
    ) -> std::io::Result<Option<Vec<Value>>> {
        let mut params = Vec::new();
        for (i, spec) in specs.iter().enumerate() {
            if tokens.len() <= i + 1 {
                if spec.required {
                    self.usage(command, specs).await?;
                    return Ok(None);
                }
                break;
            }
            if let Ok(param) = (spec.parse)(&tokens[i + 1]) {
                params.push(param);
            } else {
                self.stream
                    .write_all(format!("Invalid {}\r\n", spec.name).as_bytes())
                    .await?;
                return Ok(None);
            }
        }
        return Ok(Some(params));
    }

    async fn usage(&mut self, command: &str, specs: &Vec<Spec>) -> std::io::Result<()> {
        let mut out = String::new();
        out += format!("Usage {}", command).as_str();
        for spec in specs {
            if spec.required {
                out += format!(" <{}>", spec.name).as_str();
            } else {
                out += format!(" [{}]", spec.name).as_str();
            }
        }
        out += "\r\n";
        self.stream.write_all(out.as_bytes()).await?;
        return Ok(());
    }

    async fn wait_and_handle_response<T, F>(
        &mut self,
        resp_rx: oneshot::Receiver<Result<T, AppError>>,
        stringify: F,
    ) -> std::io::Result<()>
    where
        F: Fn(T) -> String,
    {
        let result = match timeout(Duration::from_secs(10), resp_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(AppError::runtime("control center dropped the request")),
            Err(_) => Err(AppError::timeout()),
        };
        match result {
            Ok(response) => {
                let reply = stringify(response);
                self.stream
                    .write_all(format!("{}\r\n", reply).as_bytes())
                    .await?;
            }
            Err(e) => {
                log::warn!("Operation failed: {:?}", e);
                let error_message = match e.error_type {
                    ErrorType::Timeout => "timeout\r\n".to_string(),
                    _ => format!("Error: {:?}: {}\r\n", e.error_type, e.message),
                };
                self.stream.write_all(error_message.as_bytes()).await?;
            }
        }
        return Ok(());
    }
}

fn yaml_block<T: serde::Serialize>(value: &T) -> String {
    return match serde_yaml::to_string(value) {
        Ok(text) => format!("\r\n{}", text.replace('\n', "\r\n")),
        Err(e) => format!("serialization error: {:?}", e),
    };
}
