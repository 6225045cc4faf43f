//! One actor per TCP client, mirroring the teacher's `TcpSession`: reads are
//! pushed through `ctx.add_stream`, writes go through
//! `actix::io::FramedWrite`, and every request is forwarded to the
//! [`EngineActor`]'s mailbox rather than touching the model directly.

use std::io;

use actix::prelude::*;
use tokio::io::WriteHalf;
use tokio::net::TcpStream;
use tokio_util::codec::FramedRead;

use crate::server::engine_actor::{DispatchRequest, EngineActor};
use crate::wire::codec::{Request, ResponseFrame, WireCodec};
use crate::wire::response::Response;

pub struct TcpSession {
    engine: Addr<EngineActor>,
    framed_write: actix::io::FramedWrite<ResponseFrame, WriteHalf<TcpStream>, WireCodec>,
}

impl TcpSession {
    pub fn new(engine: Addr<EngineActor>, stream: TcpStream) -> Addr<Self> {
        let (read_half, write_half) = tokio::io::split(stream);
        Self::create(|ctx| {
            ctx.add_stream(FramedRead::new(read_half, WireCodec::new()));
            TcpSession { engine, framed_write: actix::io::FramedWrite::new(write_half, WireCodec::new(), ctx) }
        })
    }
}

impl Actor for TcpSession {
    type Context = Context<Self>;
}

impl StreamHandler<Result<Request, io::Error>> for TcpSession {
    fn handle(&mut self, item: Result<Request, io::Error>, ctx: &mut Self::Context) {
        match item {
            Ok(req) => {
                let cmd = req.cmd.clone();
                let send = self.engine.send(DispatchRequest { cmd: req.cmd, params: req.params });
                ctx.spawn(send.into_actor(self).map(move |result, act, inner_ctx| {
                    let response = result.unwrap_or_else(|e| Response::error(format!("internal error: {e}"), false));
                    act.framed_write.write(ResponseFrame { cmd, response });
                    let _ = inner_ctx;
                }));
            }
            Err(e) => {
                log::warn!("connection codec error, closing: {e}");
                ctx.stop();
            }
        }
    }

    fn finished(&mut self, ctx: &mut Self::Context) {
        ctx.stop();
    }
}

impl actix::io::WriteHandler<io::Error> for TcpSession {}
