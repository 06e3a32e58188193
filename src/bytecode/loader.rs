use std::rc::Rc;

use async_recursion::async_recursion;
use tokio::io::AsyncRead;
use tracing::{debug, instrument};

use crate::error::{LuaError, LuaResult};
use crate::types::{LocalVar, LuaValue, Prototype, UpvalueDesc};

use super::instruction::Instruction;
use super::reader::ByteReader;

const SIGNATURE: [u8; 4] = [0x1B, b'L', b'u', b'a'];
const VERSION: u8 = 0x53;
const FORMAT: u8 = 0x00;
const LUAC_DATA: [u8; 6] = [0x19, 0x93, 0x0D, 0x0A, 0x1A, 0x0A];
const ENDIAN_CHECK_INT: i64 = 0x5678;
const ENDIAN_CHECK_FLOAT: f64 = 370.5;

const TAG_NIL: u8 = 0x00;
const TAG_BOOLEAN: u8 = 0x01;
const TAG_FLOAT: u8 = 0x03;
const TAG_SHORT_STRING: u8 = 0x04;
const TAG_INTEGER: u8 = 0x13;
const TAG_LONG_STRING: u8 = 0x14;

#[instrument(skip(reader))]
async fn check_header<R: AsyncRead + Unpin>(reader: &mut ByteReader<R>) -> LuaResult<()> {
    let signature = reader.read_bytes(4).await?;
    if signature != SIGNATURE {
        return Err(LuaError::CorruptChunk("bad signature"));
    }
    if reader.read_byte().await? != VERSION {
        return Err(LuaError::CorruptChunk("unsupported version"));
    }
    if reader.read_byte().await? != FORMAT {
        return Err(LuaError::CorruptChunk("unsupported format"));
    }
    let data = reader.read_bytes(6).await?;
    if data != LUAC_DATA {
        return Err(LuaError::CorruptChunk("bad luac data marker"));
    }

    // size_t=4(int), size_t=8, instruction=4, integer=8, number=8
    let sizes = reader.read_bytes(5).await?;
    if sizes != [4, 8, 4, 8, 8] {
        return Err(LuaError::CorruptChunk("unsupported size configuration"));
    }

    if reader.read_i64().await? != ENDIAN_CHECK_INT {
        return Err(LuaError::CorruptChunk("bad integer endianness check"));
    }
    if reader.read_f64().await? != ENDIAN_CHECK_FLOAT {
        return Err(LuaError::CorruptChunk("bad float endianness check"));
    }

    debug!("chunk header validated");
    Ok(())
}

fn source_name(bytes: Vec<u8>) -> Option<Rc<str>> {
    if bytes.is_empty() {
        None
    } else {
        Some(Rc::from(String::from_utf8_lossy(&bytes).into_owned()))
    }
}

#[async_recursion(?Send)]
async fn read_prototype<R: AsyncRead + Unpin>(reader: &mut ByteReader<R>) -> LuaResult<Prototype> {
    let mut proto = Prototype::new();

    proto.source = source_name(reader.read_string().await?);
    proto.line_defined = reader.read_u32().await? as i64;
    proto.last_line_defined = reader.read_u32().await? as i64;
    proto.num_params = reader.read_byte().await?;
    proto.is_vararg = reader.read_byte().await?;
    proto.max_stack_size = reader.read_byte().await?;

    let code_len = reader.read_u32().await? as usize;
    for _ in 0..code_len {
        let raw = reader.read_u32().await?;
        proto.code.push(Instruction::try_from(raw)?);
    }

    let const_len = reader.read_u32().await? as usize;
    for _ in 0..const_len {
        let tag = reader.read_byte().await?;
        let value = match tag {
            TAG_NIL => LuaValue::Nil,
            TAG_BOOLEAN => LuaValue::Boolean(reader.read_byte().await? != 0),
            TAG_FLOAT => LuaValue::Float(reader.read_f64().await?),
            TAG_INTEGER => LuaValue::Integer(reader.read_i64().await?),
            TAG_SHORT_STRING | TAG_LONG_STRING => LuaValue::new_string(reader.read_string().await?),
            _ => return Err(LuaError::CorruptChunk("unknown constant tag")),
        };
        proto.constants.push(value);
    }

    let upval_len = reader.read_u32().await? as usize;
    for _ in 0..upval_len {
        let in_stack = reader.read_byte().await? != 0;
        let index = reader.read_byte().await?;
        proto.upvalues.push(UpvalueDesc { in_stack, index });
    }

    let proto_len = reader.read_u32().await? as usize;
    for _ in 0..proto_len {
        proto.prototypes.push(Rc::new(read_prototype(reader).await?));
    }

    let line_info_len = reader.read_u32().await? as usize;
    for _ in 0..line_info_len {
        proto.line_info.push(reader.read_u32().await? as i64);
    }

    let locals_len = reader.read_u32().await? as usize;
    for _ in 0..locals_len {
        let name = source_name(reader.read_string().await?).map(|s| s.to_string()).unwrap_or_default();
        let start_pc = reader.read_u32().await? as i64;
        let end_pc = reader.read_u32().await? as i64;
        proto.locals.push(LocalVar { name, start_pc, end_pc });
    }

    let upvalue_names_len = reader.read_u32().await? as usize;
    for _ in 0..upvalue_names_len {
        let name = source_name(reader.read_string().await?).map(|s| s.to_string()).unwrap_or_default();
        proto.upvalue_names.push(name);
    }

    Ok(proto)
}

pub async fn load_chunk<R: AsyncRead + Unpin>(reader: R) -> LuaResult<Prototype> {
    let mut reader = ByteReader::new(reader);
    check_header(&mut reader).await?;
    let _size_upvalues = reader.read_byte().await?;
    read_prototype(&mut reader).await
}
