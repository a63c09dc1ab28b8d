//! Numeric game packet IDs and the name registry.

pub const LOGIN: u32 = 0x01;
pub const PLAY_STATUS: u32 = 0x02;
pub const SERVER_TO_CLIENT_HANDSHAKE: u32 = 0x03;
pub const CLIENT_TO_SERVER_HANDSHAKE: u32 = 0x04;
pub const DISCONNECT: u32 = 0x05;
pub const RESOURCE_PACKS_INFO: u32 = 0x06;
pub const RESOURCE_PACK_STACK: u32 = 0x07;
pub const RESOURCE_PACK_CLIENT_RESPONSE: u32 = 0x08;
pub const TEXT: u32 = 0x09;
pub const SET_TIME: u32 = 0x0A;
pub const START_GAME: u32 = 0x0B;
pub const ADD_PLAYER: u32 = 0x0C;
pub const ADD_ENTITY: u32 = 0x0D;
pub const REMOVE_ENTITY: u32 = 0x0E;
pub const MOVE_ENTITY: u32 = 0x12;
pub const MOVE_PLAYER: u32 = 0x13;
pub const UPDATE_BLOCK: u32 = 0x15;
pub const LEVEL_EVENT: u32 = 0x19;
pub const ENTITY_EVENT: u32 = 0x1B;
pub const UPDATE_ATTRIBUTES: u32 = 0x1D;
pub const MOB_EQUIPMENT: u32 = 0x1F;
pub const INTERACT: u32 = 0x21;
pub const PLAYER_ACTION: u32 = 0x24;
pub const SET_ENTITY_DATA: u32 = 0x27;
pub const SET_ENTITY_MOTION: u32 = 0x28;
pub const ANIMATE: u32 = 0x2C;
pub const RESPAWN: u32 = 0x2D;
pub const CONTAINER_OPEN: u32 = 0x2E;
pub const CONTAINER_CLOSE: u32 = 0x2F;
pub const INVENTORY_CONTENT: u32 = 0x31;
pub const LEVEL_CHUNK: u32 = 0x3A;
pub const SET_DIFFICULTY: u32 = 0x3C;
pub const CHANGE_DIMENSION: u32 = 0x3D;
pub const SET_PLAYER_GAME_TYPE: u32 = 0x3E;
pub const PLAYER_LIST: u32 = 0x3F;
pub const REQUEST_CHUNK_RADIUS: u32 = 0x45;
pub const CHUNK_RADIUS_UPDATED: u32 = 0x46;
pub const GAME_RULES_CHANGED: u32 = 0x48;
pub const BOSS_EVENT: u32 = 0x4A;
pub const AVAILABLE_COMMANDS: u32 = 0x4C;
pub const COMMAND_REQUEST: u32 = 0x4D;
pub const COMMAND_OUTPUT: u32 = 0x4F;
pub const TRANSFER: u32 = 0x55;
pub const PLAY_SOUND: u32 = 0x56;
pub const SET_TITLE: u32 = 0x58;
pub const MODAL_FORM_REQUEST: u32 = 0x64;
pub const MODAL_FORM_RESPONSE: u32 = 0x65;
pub const SET_LOCAL_PLAYER_AS_INITIALIZED: u32 = 0x71;
pub const NETWORK_STACK_LATENCY: u32 = 0x73;
pub const LEVEL_SOUND_EVENT: u32 = 0x7B;
pub const NETWORK_SETTINGS: u32 = 0x8F;
pub const PLAYER_AUTH_INPUT: u32 = 0x90;
pub const ITEM_REGISTRY: u32 = 0xA2;
pub const REQUEST_NETWORK_SETTINGS: u32 = 0xC1;

/// Human-readable packet name for events and subscriptions.
pub fn name(id: u32) -> Option<&'static str> {
    Some(match id {
        LOGIN => "login",
        PLAY_STATUS => "play_status",
        SERVER_TO_CLIENT_HANDSHAKE => "server_to_client_handshake",
        CLIENT_TO_SERVER_HANDSHAKE => "client_to_server_handshake",
        DISCONNECT => "disconnect",
        RESOURCE_PACKS_INFO => "resource_packs_info",
        RESOURCE_PACK_STACK => "resource_pack_stack",
        RESOURCE_PACK_CLIENT_RESPONSE => "resource_pack_client_response",
        TEXT => "text",
        SET_TIME => "set_time",
        START_GAME => "start_game",
        ADD_PLAYER => "add_player",
        ADD_ENTITY => "add_entity",
        REMOVE_ENTITY => "remove_entity",
        MOVE_ENTITY => "move_entity",
        MOVE_PLAYER => "move_player",
        UPDATE_BLOCK => "update_block",
        LEVEL_EVENT => "level_event",
        ENTITY_EVENT => "entity_event",
        UPDATE_ATTRIBUTES => "update_attributes",
        MOB_EQUIPMENT => "mob_equipment",
        INTERACT => "interact",
        PLAYER_ACTION => "player_action",
        SET_ENTITY_DATA => "set_entity_data",
        SET_ENTITY_MOTION => "set_entity_motion",
        ANIMATE => "animate",
        RESPAWN => "respawn",
        CONTAINER_OPEN => "container_open",
        CONTAINER_CLOSE => "container_close",
        INVENTORY_CONTENT => "inventory_content",
        LEVEL_CHUNK => "level_chunk",
        SET_DIFFICULTY => "set_difficulty",
        CHANGE_DIMENSION => "change_dimension",
        SET_PLAYER_GAME_TYPE => "set_player_game_type",
        PLAYER_LIST => "player_list",
        REQUEST_CHUNK_RADIUS => "request_chunk_radius",
        CHUNK_RADIUS_UPDATED => "chunk_radius_updated",
        GAME_RULES_CHANGED => "game_rules_changed",
        BOSS_EVENT => "boss_event",
        AVAILABLE_COMMANDS => "available_commands",
        COMMAND_REQUEST => "command_request",
        COMMAND_OUTPUT => "command_output",
        TRANSFER => "transfer",
        PLAY_SOUND => "play_sound",
        SET_TITLE => "set_title",
        MODAL_FORM_REQUEST => "modal_form_request",
        MODAL_FORM_RESPONSE => "modal_form_response",
        SET_LOCAL_PLAYER_AS_INITIALIZED => "set_local_player_as_initialized",
        NETWORK_STACK_LATENCY => "network_stack_latency",
        LEVEL_SOUND_EVENT => "level_sound_event",
        NETWORK_SETTINGS => "network_settings",
        PLAYER_AUTH_INPUT => "player_auth_input",
        ITEM_REGISTRY => "item_registry",
        REQUEST_NETWORK_SETTINGS => "request_network_settings",
        _ => return None,
    })
}

/// Reverse lookup used by name-based packet subscriptions.
pub fn id_by_name(name_query: &str) -> Option<u32> {
    // The registry is small; a scan beats maintaining a second table.
    (0..=0xFF).chain([NETWORK_SETTINGS, PLAYER_AUTH_INPUT, ITEM_REGISTRY, REQUEST_NETWORK_SETTINGS])
        .find(|&id| name(id) == Some(name_query))
}
